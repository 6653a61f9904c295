use super::*;

/// the deployer supplies the ARN of the lambda that copies assets into place
/// and creates the invalidation.
pub const HANDLER_PARAMETER: &str = "BucketDeploymentHandlerArn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// a local directory (or zip file) uploaded as-is.
    Asset(PathBuf),
}

impl Source {
    pub fn asset<P: Into<PathBuf>>(path: P) -> Self {
        Source::Asset(path.into())
    }
}

#[derive(Debug, Clone)]
pub struct BucketDeploymentProps {
    pub sources: Vec<Source>,
    pub destination_bucket: Arc<Bucket>,
    pub destination_key_prefix: Option<String>,
    /// when set without `distribution_paths`, the whole distribution ("/*") is invalidated.
    pub distribution: Option<Arc<Distribution>>,
    pub distribution_paths: Vec<String>,
    /// delete objects in the destination that are not part of the sources.
    pub prune: bool,
    pub retain_on_delete: bool,
}

impl BucketDeploymentProps {
    pub fn new(sources: Vec<Source>, destination_bucket: &Arc<Bucket>) -> Self {
        Self {
            sources,
            destination_bucket: destination_bucket.clone(),
            destination_key_prefix: None,
            distribution: None,
            distribution_paths: vec![],
            prune: true,
            retain_on_delete: false,
        }
    }
}

/// Uploads local assets into a bucket and, optionally, invalidates a
/// distribution afterwards so edge caches don't keep serving old files.
#[derive(Debug)]
pub struct BucketDeployment {
    logical_id: String,
    pub assets: Vec<AssetSource>,
    pub destination_bucket: Arc<Bucket>,
    pub destination_key_prefix: Option<String>,
    pub distribution: Option<Arc<Distribution>>,
    pub distribution_paths: Vec<String>,
    pub prune: bool,
    pub retain_on_delete: bool,
}

impl BucketDeployment {
    pub fn declare(scope: &mut Scope, id: &str, props: BucketDeploymentProps) -> Arc<BucketDeployment> {
        let logical_id = scope.logical_id(id);
        let assets: Vec<AssetSource> = props.sources.into_iter()
            .enumerate()
            .map(|(i, source)| match source {
                Source::Asset(path) => AssetSource::new(&format!("{logical_id}Asset{}", i + 1), path),
            })
            .collect();
        for asset in assets.iter() {
            scope.add_asset(asset.clone());
        }
        scope.add_parameter(HANDLER_PARAMETER, Parameter::string("ARN of the lambda function that performs bucket deployments"));

        let mut distribution_paths = props.distribution_paths;
        if props.distribution.is_some() && distribution_paths.is_empty() {
            distribution_paths.push("/*".to_string());
        }
        scope.add(BucketDeployment {
            logical_id,
            assets,
            destination_bucket: props.destination_bucket,
            destination_key_prefix: props.destination_key_prefix,
            distribution: props.distribution,
            distribution_paths,
            prune: props.prune,
            retain_on_delete: props.retain_on_delete,
        })
    }
}

impl CfnResource for BucketDeployment {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn type_string(&self) -> &'static str {
        "Custom::CDKBucketDeployment"
    }

    fn properties(&self) -> Value {
        let mut map = Map::new();
        map.insert("ServiceToken".to_string(), get_ref(HANDLER_PARAMETER));
        map.insert("SourceBucketNames".to_string(), Value::Array(
            self.assets.iter().map(|a| get_ref(&a.bucket_parameter)).collect()
        ));
        map.insert("SourceObjectKeys".to_string(), Value::Array(
            self.assets.iter().map(|a| get_ref(&a.key_parameter)).collect()
        ));
        map.insert("DestinationBucketName".to_string(), self.destination_bucket.bucket_ref());
        if let Some(prefix) = &self.destination_key_prefix {
            map.insert("DestinationBucketKeyPrefix".to_string(), Value::String(prefix.clone()));
        }
        map.insert("Prune".to_string(), Value::Bool(self.prune));
        map.insert("RetainOnDelete".to_string(), Value::Bool(self.retain_on_delete));
        if let Some(distribution) = &self.distribution {
            map.insert("DistributionId".to_string(), distribution.distribution_id());
            map.insert("DistributionPaths".to_string(), json!(self.distribution_paths));
        }
        Value::Object(map)
    }

    fn validate(&self) -> Result<(), String> {
        if self.assets.is_empty() {
            return Err("A bucket deployment needs at least one source".into());
        }
        if self.distribution.is_none() && !self.distribution_paths.is_empty() {
            return Err("Distribution must be specified if distribution paths are specified".into());
        }
        if let Some(bad) = self.distribution_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(format!("Distribution paths must start with '/', found {bad:?}"));
        }
        Ok(())
    }
}
