use serde::Deserialize;

use super::*;

/// What to publish and under which name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteConfiguration {
    /// used as the construct id and as the prefix of the bucket name.
    pub domain: String,
    /// local directory holding the built site.
    pub assets_path: PathBuf,
}

impl SiteConfiguration {
    pub fn new<S: AsRef<str>, P: Into<PathBuf>>(domain: S, assets_path: P) -> Self {
        Self {
            domain: domain.as_ref().to_string(),
            assets_path: assets_path.into(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| SiteError::io(path, e))?;
        Self::from_toml_str(&contents)
    }
}

/// Declares the infrastructure of one static website:
/// a private bucket, an origin access identity with read access to it,
/// a cloudfront distribution reading through that identity, and a deployment
/// that uploads `assets_path` and invalidates the distribution.
#[derive(Debug, Clone)]
pub struct StaticSiteBuilder {
    config: SiteConfiguration,
}

/// Everything `StaticSiteBuilder::build` declared. Hand these to other
/// constructs, ie: to point DNS records at the distribution.
#[derive(Debug, Clone)]
pub struct StaticSite {
    pub config: SiteConfiguration,
    pub bucket: Arc<Bucket>,
    pub access_identity: Arc<OriginAccessIdentity>,
    pub bucket_policy: Arc<BucketPolicy>,
    pub distribution: Arc<Distribution>,
    pub deployment: Arc<BucketDeployment>,
}

impl StaticSiteBuilder {
    pub fn new(config: SiteConfiguration) -> Self {
        Self { config }
    }

    /// `{domain}-{account}-{region}`, unique per account and region.
    /// The domain is not checked against the S3 naming rules here.
    pub fn bucket_name(&self, env: &Environment) -> String {
        format!("{}-{}-{}", self.config.domain, env.account, env.region)
    }

    /// Declares everything into a scope named after the domain and commits
    /// it to `stack` in one go. On error the stack is left untouched.
    pub fn build(self, stack: &mut Stack) -> Result<StaticSite> {
        let mut scope = stack.scope(&self.config.domain);
        let bucket = self.create_s3_bucket(&mut scope)?;
        let (access_identity, bucket_policy) = allow_cloudfront_access(&mut scope, &bucket);
        let distribution = create_cloudfront(&mut scope, &bucket, &access_identity, &bucket_policy);
        let deployment = self.upload_static_assets(&mut scope, &bucket, &distribution);
        stack.commit(scope)?;
        tracing::info!(domain = %self.config.domain, bucket = bucket.logical_id(), "declared static site");

        Ok(StaticSite {
            config: self.config,
            bucket,
            access_identity,
            bucket_policy,
            distribution,
            deployment,
        })
    }

    fn create_s3_bucket(&self, scope: &mut Scope) -> Result<Arc<Bucket>> {
        let bucket_name = self.bucket_name(scope.env());
        Bucket::declare(scope, "SiteBucket", BucketProps {
            bucket_name: Some(bucket_name),
            website: Some(WebsiteConfiguration::default()),
            public_read_access: false,
            block_public_access: Some(BlockPublicAccess::BLOCK_ALL),
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
        })
    }

    fn upload_static_assets(&self, scope: &mut Scope, bucket: &Arc<Bucket>, distribution: &Arc<Distribution>) -> Arc<BucketDeployment> {
        let mut props = BucketDeploymentProps::new(vec![Source::asset(self.config.assets_path.clone())], bucket);
        props.distribution = Some(distribution.clone());
        props.distribution_paths = vec!["/*".to_string()];
        BucketDeployment::declare(scope, "DeployWithInvalidation", props)
    }
}

fn allow_cloudfront_access(scope: &mut Scope, bucket: &Arc<Bucket>) -> (Arc<OriginAccessIdentity>, Arc<BucketPolicy>) {
    let access_identity = OriginAccessIdentity::declare(scope, "cf-s3-access");
    let s3_get_policy = PolicyStatement::allow(&["s3:GetObject"], vec![bucket.arn_for_objects("*")])
        .with_principal(access_identity.principal());
    let bucket_policy = BucketPolicy::declare(scope, "SiteBucketPolicy", bucket, vec![s3_get_policy]);
    (access_identity, bucket_policy)
}

fn create_cloudfront(
    scope: &mut Scope,
    bucket: &Arc<Bucket>,
    access_identity: &Arc<OriginAccessIdentity>,
    bucket_policy: &Arc<BucketPolicy>,
) -> Arc<Distribution> {
    let web_assets_origin = SourceConfiguration {
        s3_origin_source: S3OriginSource {
            bucket: bucket.clone(),
            origin_access_identity: access_identity.clone(),
            origin_path: None,
        },
        behaviors: vec![Behavior {
            is_default_behavior: true,
            compress: true,
            allowed_methods: AllowedMethods::GetHeadOptions,
            ..Default::default()
        }],
    };
    let policy: Arc<dyn CfnResource> = bucket_policy.clone();
    Distribution::declare(scope, "SiteDistribution", DistributionProps {
        origin_configs: vec![web_assets_origin],
        default_root_object: Some("index.html".into()),
        enable_ipv6: true,
        // the bucket has to grant the identity access before anything is served from it
        depends_on: vec![policy],
        ..Default::default()
    })
}

impl StaticSite {
    /// exports the bucket name and the distribution id/domain as stack outputs,
    /// prefixed with the alphanumeric characters of the domain.
    pub fn add_outputs(&self, stack: &mut Stack) -> Result<()> {
        let prefix: String = self.config.domain.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let domain = &self.config.domain;
        stack.add_output(format!("{prefix}BucketName"), format!("bucket holding {domain}"), self.bucket.bucket_ref())?;
        stack.add_output(format!("{prefix}DistributionId"), format!("distribution serving {domain}"), self.distribution.distribution_id())?;
        stack.add_output(format!("{prefix}DistributionDomainName"), format!("point {domain} here"), self.distribution.domain_name())?;
        Ok(())
    }
}
