use super::*;

/// An identity cloudfront uses when reading from an S3 origin.
/// Grant it access in the bucket policy, and nothing else can read the bucket.
#[derive(Debug)]
pub struct OriginAccessIdentity {
    logical_id: String,
    pub comment: String,
}

impl OriginAccessIdentity {
    pub fn declare(scope: &mut Scope, id: &str) -> Arc<OriginAccessIdentity> {
        let logical_id = scope.logical_id(id);
        let comment = format!("Allows CloudFront to reach the bucket of {}", scope.id());
        scope.add(OriginAccessIdentity { logical_id, comment })
    }

    pub fn oai_ref(&self) -> Value {
        get_ref(&self.logical_id)
    }

    pub fn s3_canonical_user_id(&self) -> Value {
        get_att(&self.logical_id, "S3CanonicalUserId")
    }

    pub fn principal(&self) -> Principal {
        Principal::CanonicalUser(self.s3_canonical_user_id())
    }

    /// the form S3 origins expect: origin-access-identity/cloudfront/{id}
    pub fn origin_access_path(&self) -> Value {
        join("", vec![Value::String("origin-access-identity/cloudfront/".into()), self.oai_ref()])
    }
}

impl CfnResource for OriginAccessIdentity {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::CloudFrontOriginAccessIdentity"
    }

    fn properties(&self) -> Value {
        json!({
            "CloudFrontOriginAccessIdentityConfig": { "Comment": self.comment }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllowedMethods {
    #[default]
    GetHead,
    GetHeadOptions,
    All,
}

impl AllowedMethods {
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            AllowedMethods::GetHead => &["GET", "HEAD"],
            AllowedMethods::GetHeadOptions => &["GET", "HEAD", "OPTIONS"],
            AllowedMethods::All => &["DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachedMethods {
    #[default]
    GetHead,
    GetHeadOptions,
}

impl CachedMethods {
    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            CachedMethods::GetHead => &["GET", "HEAD"],
            CachedMethods::GetHeadOptions => &["GET", "HEAD", "OPTIONS"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewerProtocolPolicy {
    AllowAll,
    #[default]
    RedirectToHttps,
    HttpsOnly,
}

impl ViewerProtocolPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewerProtocolPolicy::AllowAll => "allow-all",
            ViewerProtocolPolicy::RedirectToHttps => "redirect-to-https",
            ViewerProtocolPolicy::HttpsOnly => "https-only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceClass {
    #[default]
    PriceClass100,
    PriceClass200,
    PriceClassAll,
}

impl PriceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceClass::PriceClass100 => "PriceClass_100",
            PriceClass::PriceClass200 => "PriceClass_200",
            PriceClass::PriceClassAll => "PriceClass_All",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Behavior {
    /// exactly one behavior across the whole distribution must be the default.
    pub is_default_behavior: bool,
    /// required for every behavior except the default one.
    pub path_pattern: Option<String>,
    pub allowed_methods: AllowedMethods,
    pub cached_methods: CachedMethods,
    pub compress: bool,
    pub forward_query_string: bool,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
}

impl Behavior {
    fn to_value(&self, target_origin_id: &str) -> Value {
        let mut map = Map::new();
        if let Some(pattern) = &self.path_pattern {
            map.insert("PathPattern".to_string(), Value::String(pattern.clone()));
        }
        map.insert("TargetOriginId".to_string(), Value::String(target_origin_id.into()));
        map.insert("AllowedMethods".to_string(), json!(self.allowed_methods.methods()));
        map.insert("CachedMethods".to_string(), json!(self.cached_methods.methods()));
        map.insert("Compress".to_string(), Value::Bool(self.compress));
        map.insert("ViewerProtocolPolicy".to_string(), Value::String(self.viewer_protocol_policy.as_str().into()));
        map.insert("ForwardedValues".to_string(), json!({
            "QueryString": self.forward_query_string,
            "Cookies": { "Forward": "none" },
        }));
        Value::Object(map)
    }
}

/// An S3 bucket read through an origin access identity.
/// Public website endpoints are never used as origins.
#[derive(Debug, Clone)]
pub struct S3OriginSource {
    pub bucket: Arc<Bucket>,
    pub origin_access_identity: Arc<OriginAccessIdentity>,
    pub origin_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceConfiguration {
    pub s3_origin_source: S3OriginSource,
    pub behaviors: Vec<Behavior>,
}

#[derive(Debug, Clone)]
pub struct ViewerCertificate {
    pub acm_certificate_arn: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DistributionProps {
    pub origin_configs: Vec<SourceConfiguration>,
    pub comment: Option<String>,
    pub default_root_object: Option<String>,
    pub price_class: PriceClass,
    pub enable_ipv6: bool,
    /// when unset the default *.cloudfront.net certificate is used.
    pub viewer_certificate: Option<ViewerCertificate>,
    /// resources that must be in place before the distribution is created,
    /// on top of the origins it already references.
    pub depends_on: Vec<Arc<dyn CfnResource>>,
}

#[derive(Debug)]
pub struct Distribution {
    logical_id: String,
    pub props: DistributionProps,
}

impl Distribution {
    pub fn declare(scope: &mut Scope, id: &str, props: DistributionProps) -> Arc<Distribution> {
        let logical_id = scope.logical_id(id);
        scope.add(Distribution { logical_id, props })
    }

    pub fn distribution_id(&self) -> Value {
        get_ref(&self.logical_id)
    }

    pub fn domain_name(&self) -> Value {
        get_att(&self.logical_id, "DomainName")
    }

    pub fn default_behavior(&self) -> Option<&Behavior> {
        self.props.origin_configs.iter()
            .flat_map(|c| c.behaviors.iter())
            .find(|b| b.is_default_behavior)
    }

    fn origin_id(index: usize) -> String {
        format!("origin{}", index + 1)
    }
}

impl CfnResource for Distribution {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn type_string(&self) -> &'static str {
        "AWS::CloudFront::Distribution"
    }

    fn properties(&self) -> Value {
        let mut origins = vec![];
        let mut default_behavior = Value::Null;
        let mut cache_behaviors = vec![];
        for (i, config) in self.props.origin_configs.iter().enumerate() {
            let origin_id = Self::origin_id(i);
            let source = &config.s3_origin_source;
            let mut origin = Map::new();
            origin.insert("Id".to_string(), Value::String(origin_id.clone()));
            origin.insert("DomainName".to_string(), source.bucket.regional_domain_name());
            origin.insert("S3OriginConfig".to_string(), json!({
                "OriginAccessIdentity": source.origin_access_identity.origin_access_path(),
            }));
            if let Some(path) = &source.origin_path {
                origin.insert("OriginPath".to_string(), Value::String(path.clone()));
            }
            origins.push(Value::Object(origin));
            for behavior in config.behaviors.iter() {
                if behavior.is_default_behavior {
                    default_behavior = behavior.to_value(&origin_id);
                } else {
                    cache_behaviors.push(behavior.to_value(&origin_id));
                }
            }
        }

        let mut config = Map::new();
        config.insert("Enabled".to_string(), Value::Bool(true));
        config.insert("HttpVersion".to_string(), Value::String("http2".into()));
        config.insert("IPV6Enabled".to_string(), Value::Bool(self.props.enable_ipv6));
        config.insert("PriceClass".to_string(), Value::String(self.props.price_class.as_str().into()));
        if let Some(comment) = &self.props.comment {
            config.insert("Comment".to_string(), Value::String(comment.clone()));
        }
        if let Some(root) = &self.props.default_root_object {
            config.insert("DefaultRootObject".to_string(), Value::String(root.clone()));
        }
        config.insert("Origins".to_string(), Value::Array(origins));
        config.insert("DefaultCacheBehavior".to_string(), default_behavior);
        if !cache_behaviors.is_empty() {
            config.insert("CacheBehaviors".to_string(), Value::Array(cache_behaviors));
        }
        match &self.props.viewer_certificate {
            Some(cert) => {
                config.insert("Aliases".to_string(), json!(cert.aliases));
                config.insert("ViewerCertificate".to_string(), json!({
                    "AcmCertificateArn": cert.acm_certificate_arn,
                    "MinimumProtocolVersion": "TLSv1.2_2021",
                    "SslSupportMethod": "sni-only",
                }));
            }
            None => {
                config.insert("ViewerCertificate".to_string(), json!({ "CloudFrontDefaultCertificate": true }));
            }
        }
        json!({ "DistributionConfig": Value::Object(config) })
    }

    fn depends_on(&self) -> Vec<String> {
        self.props.depends_on.iter().map(|r| r.logical_id().to_string()).collect()
    }

    fn validate(&self) -> Result<(), String> {
        if self.props.origin_configs.is_empty() {
            return Err("Must provide at least one origin to a cloudfront distribution".into());
        }
        let behaviors: Vec<&Behavior> = self.props.origin_configs.iter().flat_map(|c| c.behaviors.iter()).collect();
        let defaults = behaviors.iter().filter(|b| b.is_default_behavior).count();
        if defaults != 1 {
            return Err(format!("A distribution must have exactly one default behavior, found {defaults}"));
        }
        for behavior in behaviors {
            match (&behavior.path_pattern, behavior.is_default_behavior) {
                (Some(pattern), true) => {
                    return Err(format!("The default behavior cannot have a path pattern, found {pattern:?}"));
                }
                (None, false) => {
                    return Err("Every non-default behavior must have a path pattern".into());
                }
                _ => {}
            }
        }
        if let Some(cert) = &self.props.viewer_certificate {
            if cert.aliases.is_empty() {
                return Err("A custom certificate requires at least one alias".into());
            }
        }
        Ok(())
    }
}
