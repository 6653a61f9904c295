use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteConfiguration {
    pub index_document: String,
    pub error_document: String,
}

impl Default for WebsiteConfiguration {
    fn default() -> Self {
        Self {
            index_document: "index.html".into(),
            error_document: "error.html".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPublicAccess {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl BlockPublicAccess {
    pub const BLOCK_ALL: BlockPublicAccess = BlockPublicAccess {
        block_public_acls: true,
        block_public_policy: true,
        ignore_public_acls: true,
        restrict_public_buckets: true,
    };

    pub const BLOCK_ACLS: BlockPublicAccess = BlockPublicAccess {
        block_public_acls: true,
        block_public_policy: false,
        ignore_public_acls: true,
        restrict_public_buckets: false,
    };

    pub fn is_block_all(&self) -> bool {
        *self == Self::BLOCK_ALL
    }

    fn to_value(self) -> Value {
        json!({
            "BlockPublicAcls": self.block_public_acls,
            "BlockPublicPolicy": self.block_public_policy,
            "IgnorePublicAcls": self.ignore_public_acls,
            "RestrictPublicBuckets": self.restrict_public_buckets,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct BucketProps {
    /// if left empty, cloudformation generates a name from the logical id.
    pub bucket_name: Option<String>,
    pub website: Option<WebsiteConfiguration>,
    pub public_read_access: bool,
    pub block_public_access: Option<BlockPublicAccess>,
    pub removal_policy: RemovalPolicy,
    /// S3 buckets in cloudformation cannot be deleted if they contain objects.
    /// When set, a cleanup resource empties the bucket before it gets deleted.
    /// Requires `removal_policy` to be `Destroy`.
    pub auto_delete_objects: bool,
}

#[derive(Debug)]
pub struct Bucket {
    logical_id: String,
    pub bucket_name: Option<String>,
    pub website: Option<WebsiteConfiguration>,
    pub public_read_access: bool,
    pub block_public_access: Option<BlockPublicAccess>,
    pub removal_policy: RemovalPolicy,
    pub auto_delete_objects: bool,
}

impl Bucket {
    /// declares the bucket, plus its cleanup resources if `auto_delete_objects` is set.
    pub fn declare(scope: &mut Scope, id: &str, props: BucketProps) -> Result<Arc<Bucket>> {
        let logical_id = scope.logical_id(id);
        if props.auto_delete_objects && props.removal_policy != RemovalPolicy::Destroy {
            return Err(SiteError::invalid_resource(
                &logical_id,
                "Cannot use 'auto_delete_objects' on a bucket without setting the removal policy to Destroy",
            ));
        }
        if props.public_read_access {
            if let Some(block) = &props.block_public_access {
                if block.block_public_policy || block.restrict_public_buckets {
                    return Err(SiteError::invalid_resource(
                        &logical_id,
                        "Cannot use 'public_read_access' on a bucket that blocks public policies",
                    ));
                }
            }
        }
        let bucket = scope.add(Bucket {
            logical_id,
            bucket_name: props.bucket_name,
            website: props.website,
            public_read_access: props.public_read_access,
            block_public_access: props.block_public_access,
            removal_policy: props.removal_policy,
            auto_delete_objects: props.auto_delete_objects,
        });
        if bucket.auto_delete_objects {
            AutoDeleteObjects::declare(scope, &format!("{id}AutoDeleteObjects"), &bucket);
        }
        Ok(bucket)
    }

    pub fn bucket_ref(&self) -> Value {
        get_ref(&self.logical_id)
    }

    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    /// the ARN of objects matching `key_pattern`, ie: `arn_for_objects("*")`.
    pub fn arn_for_objects(&self, key_pattern: &str) -> Value {
        join("", vec![self.arn(), Value::String(format!("/{key_pattern}"))])
    }

    pub fn regional_domain_name(&self) -> Value {
        get_att(&self.logical_id, "RegionalDomainName")
    }

    pub fn website_url(&self) -> Value {
        get_att(&self.logical_id, "WebsiteURL")
    }
}

impl CfnResource for Bucket {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn type_string(&self) -> &'static str {
        "AWS::S3::Bucket"
    }

    fn properties(&self) -> Value {
        let mut map = Map::new();
        let access_control = if self.public_read_access { "PublicRead" } else { "Private" };
        map.insert("AccessControl".to_string(), Value::String(access_control.into()));
        if let Some(name) = &self.bucket_name {
            map.insert("BucketName".to_string(), Value::String(name.clone()));
        }
        if let Some(block) = self.block_public_access {
            map.insert("PublicAccessBlockConfiguration".to_string(), block.to_value());
        }
        if let Some(website) = &self.website {
            map.insert("WebsiteConfiguration".to_string(), json!({
                "IndexDocument": website.index_document,
                "ErrorDocument": website.error_document,
            }));
        }
        Value::Object(map)
    }

    fn removal_policy(&self) -> Option<RemovalPolicy> {
        Some(self.removal_policy)
    }
}

/// A resource policy attached to a bucket. Every statement must name a principal.
#[derive(Debug)]
pub struct BucketPolicy {
    logical_id: String,
    pub bucket: Arc<Bucket>,
    pub statements: Vec<PolicyStatement>,
}

impl BucketPolicy {
    pub fn declare(scope: &mut Scope, id: &str, bucket: &Arc<Bucket>, statements: Vec<PolicyStatement>) -> Arc<BucketPolicy> {
        let logical_id = scope.logical_id(id);
        scope.add(BucketPolicy {
            logical_id,
            bucket: bucket.clone(),
            statements,
        })
    }
}

impl CfnResource for BucketPolicy {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn type_string(&self) -> &'static str {
        "AWS::S3::BucketPolicy"
    }

    fn properties(&self) -> Value {
        json!({
            "Bucket": self.bucket.bucket_ref(),
            "PolicyDocument": create_policy_doc(&self.statements),
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.statements.is_empty() {
            return Err("A bucket policy must contain at least one statement".into());
        }
        if self.statements.iter().any(|s| s.principals.is_empty()) {
            return Err("Every statement of a bucket policy must specify a principal".into());
        }
        Ok(())
    }
}

const AUTO_DELETE_HANDLER: &str = r#"
const { S3Client, ListObjectVersionsCommand, DeleteObjectsCommand } = require('@aws-sdk/client-s3');
const response = require('cfn-response');
const s3 = new S3Client({});
async function emptyBucket(bucketName) {
    let KeyMarker, VersionIdMarker;
    do {
        const page = await s3.send(new ListObjectVersionsCommand({ Bucket: bucketName, KeyMarker, VersionIdMarker }));
        const objects = [...(page.Versions || []), ...(page.DeleteMarkers || [])]
            .map(o => ({ Key: o.Key, VersionId: o.VersionId }));
        if (objects.length > 0) {
            await s3.send(new DeleteObjectsCommand({ Bucket: bucketName, Delete: { Objects: objects } }));
        }
        KeyMarker = page.NextKeyMarker;
        VersionIdMarker = page.NextVersionIdMarker;
    } while (KeyMarker);
}
exports.handler = async function(event, context) {
    let responseType = response.SUCCESS;
    if (event.RequestType == 'Delete') {
        try {
            await emptyBucket(event.ResourceProperties.BucketName);
        } catch (err) {
            if (err.name != 'NoSuchBucket') {
                console.log(`Error deleting objects from S3 bucket: ${err}`);
                responseType = response.FAILED;
            }
        }
    }
    await response.send(event, context, responseType);
}
"#;

/// Empties a bucket when the stack deletes it.
/// The delete permissions live on the handler's role, so the bucket's own
/// resource policy never mentions them.
#[derive(Debug)]
pub struct AutoDeleteObjects {
    logical_id: String,
    pub bucket: Arc<Bucket>,
    pub handler: Arc<Function>,
    pub role: Arc<Role>,
}

impl AutoDeleteObjects {
    pub fn declare(scope: &mut Scope, id: &str, bucket: &Arc<Bucket>) -> Arc<AutoDeleteObjects> {
        let statements = vec![
            PolicyStatement::allow(&["s3:ListBucket", "s3:ListBucketVersions", "s3:GetBucket*"], vec![bucket.arn()]),
            PolicyStatement::allow(&["s3:DeleteObject*"], vec![bucket.arn_for_objects("*")]),
        ];
        let role = Role::declare(scope, &format!("{id}Role"), RoleProps {
            description: Some(format!("cleanup role for bucket {}", bucket.logical_id())),
            service: "lambda.amazonaws.com".into(),
            managed_policy_arns: vec![sub(BASIC_EXECUTION_POLICY)],
            inline_policies: vec![("auto-delete-objects".into(), statements)],
        });
        let handler = Function::declare(scope, &format!("{id}Handler"), FunctionProps {
            description: Some(format!("empties bucket {} on stack delete", bucket.logical_id())),
            runtime: Runtime::Nodejs20x,
            handler: "index.handler".into(),
            inline_code: AUTO_DELETE_HANDLER.into(),
            timeout_seconds: 900,
            role: role.clone(),
        });
        let logical_id = scope.logical_id(id);
        scope.add(AutoDeleteObjects {
            logical_id,
            bucket: bucket.clone(),
            handler,
            role,
        })
    }
}

impl CfnResource for AutoDeleteObjects {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn type_string(&self) -> &'static str {
        "Custom::S3AutoDeleteObjects"
    }

    fn properties(&self) -> Value {
        json!({
            "ServiceToken": self.handler.arn(),
            "BucketName": self.bucket.bucket_ref(),
        })
    }

    fn removal_policy(&self) -> Option<RemovalPolicy> {
        Some(RemovalPolicy::Destroy)
    }
}

/// Checks a bucket name against the S3 naming rules and returns every rule it breaks.
/// Nothing in the crate refuses to declare a bucket because of this;
/// synthesis only logs the result.
pub fn bucket_name_violations(name: &str) -> Vec<String> {
    let mut out = vec![];
    if name.len() < 3 || name.len() > 63 {
        out.push(format!("must be between 3 and 63 characters long, found {}", name.len()));
    }
    if let Some(c) = name.chars().find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-')) {
        out.push(format!("may only contain lowercase letters, numbers, dots and hyphens, found {c:?}"));
    }
    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        out.push("must begin and end with a letter or number".to_string());
    }
    if name.contains("..") || name.contains(".-") || name.contains("-.") {
        out.push("must not contain adjacent punctuation".to_string());
    }
    let octets: Vec<&str> = name.split('.').collect();
    if octets.len() == 4 && octets.iter().all(|o| !o.is_empty() && o.len() <= 3 && o.chars().all(|c| c.is_ascii_digit())) {
        out.push("must not be formatted as an IP address".to_string());
    }
    for prefix in ["xn--", "sthree-"] {
        if name.starts_with(prefix) {
            out.push(format!("must not start with {prefix:?}"));
        }
    }
    for suffix in ["-s3alias", "--ol-s3"] {
        if name.ends_with(suffix) {
            out.push(format!("must not end with {suffix:?}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Environment;

    fn stack() -> Stack {
        Stack::new("test", Environment::new("123456789012", "us-east-1")).unwrap()
    }

    #[test]
    fn private_bucket_properties() {
        let stack = stack();
        let mut scope = stack.scope("site");
        let bucket = Bucket::declare(&mut scope, "Bucket", BucketProps {
            bucket_name: Some("my-bucket".into()),
            website: Some(Default::default()),
            block_public_access: Some(BlockPublicAccess::BLOCK_ALL),
            ..Default::default()
        }).unwrap();
        assert_eq!(bucket.properties(), json!({
            "AccessControl": "Private",
            "BucketName": "my-bucket",
            "PublicAccessBlockConfiguration": {
                "BlockPublicAcls": true,
                "BlockPublicPolicy": true,
                "IgnorePublicAcls": true,
                "RestrictPublicBuckets": true,
            },
            "WebsiteConfiguration": {
                "IndexDocument": "index.html",
                "ErrorDocument": "error.html",
            },
        }));
        assert_eq!(bucket.removal_policy(), Some(RemovalPolicy::Retain));
        // no cleanup resources unless asked for
        assert_eq!(scope.resources().len(), 1);
    }

    #[test]
    fn auto_delete_needs_destroy_policy() {
        let stack = stack();
        let mut scope = stack.scope("site");
        let err = Bucket::declare(&mut scope, "Bucket", BucketProps {
            auto_delete_objects: true,
            ..Default::default()
        }).unwrap_err();
        assert!(matches!(err, SiteError::InvalidResource { .. }));
        assert!(scope.resources().is_empty());
    }

    #[test]
    fn public_read_conflicts_with_blocking() {
        let stack = stack();
        let mut scope = stack.scope("site");
        let res = Bucket::declare(&mut scope, "Bucket", BucketProps {
            public_read_access: true,
            block_public_access: Some(BlockPublicAccess::BLOCK_ALL),
            ..Default::default()
        });
        assert!(res.is_err());
        let bucket = Bucket::declare(&mut scope, "Bucket", BucketProps {
            public_read_access: true,
            block_public_access: Some(BlockPublicAccess::BLOCK_ACLS),
            ..Default::default()
        }).unwrap();
        assert_eq!(bucket.properties()["AccessControl"], "PublicRead");
    }

    #[test]
    fn auto_delete_declares_cleanup_resources() {
        let mut stack = stack();
        let mut scope = stack.scope("site");
        let bucket = Bucket::declare(&mut scope, "Bucket", BucketProps {
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
            ..Default::default()
        }).unwrap();
        let types: Vec<&str> = scope.resources().iter().map(|r| r.type_string()).collect();
        assert_eq!(types, vec![
            "AWS::S3::Bucket",
            "AWS::IAM::Role",
            "AWS::Lambda::Function",
            "Custom::S3AutoDeleteObjects",
        ]);
        stack.commit(scope).unwrap();

        let template = serde_json::to_value(stack.to_template().unwrap()).unwrap();
        let resources = template["Resources"].as_object().unwrap();
        let (_, cleanup) = resources.iter().find(|(_, r)| r["Type"] == "Custom::S3AutoDeleteObjects").unwrap();
        assert_eq!(cleanup["Properties"]["BucketName"], bucket.bucket_ref());
        let (_, role) = resources.iter().find(|(_, r)| r["Type"] == "AWS::IAM::Role").unwrap();
        let statements = &role["Properties"]["Policies"][0]["PolicyDocument"]["Statement"];
        assert_eq!(statements[1]["Action"], "s3:DeleteObject*");
        assert_eq!(statements[1]["Resource"], bucket.arn_for_objects("*"));
    }

    #[test]
    fn bucket_policy_requires_principals() {
        let stack = stack();
        let mut scope = stack.scope("site");
        let bucket = Bucket::declare(&mut scope, "Bucket", Default::default()).unwrap();
        let policy = BucketPolicy::declare(&mut scope, "Policy", &bucket, vec![
            PolicyStatement::allow(&["s3:GetObject"], vec![bucket.arn_for_objects("*")]),
        ]);
        assert!(policy.validate().is_err());
        let empty = BucketPolicy::declare(&mut scope, "Empty", &bucket, vec![]);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn object_arns_join_onto_bucket_arn() {
        let stack = stack();
        let mut scope = stack.scope("site");
        let bucket = Bucket::declare(&mut scope, "Bucket", Default::default()).unwrap();
        let id = bucket.logical_id().to_string();
        assert_eq!(
            bucket.arn_for_objects("*"),
            json!({ "Fn::Join": ["", [{ "Fn::GetAtt": [id, "Arn"] }, "/*"]] })
        );
    }

    #[test]
    fn website_attributes() {
        let stack = stack();
        let mut scope = stack.scope("site");
        let bucket = Bucket::declare(&mut scope, "Bucket", Default::default()).unwrap();
        let id = bucket.logical_id().to_string();
        assert_eq!(bucket.website_url(), json!({ "Fn::GetAtt": [id, "WebsiteURL"] }));
        assert_eq!(bucket.regional_domain_name(), json!({ "Fn::GetAtt": [id, "RegionalDomainName"] }));
    }

    #[test]
    fn bucket_naming_rules() {
        assert!(bucket_name_violations("example.com-123456789012-us-east-1").is_empty());
        assert!(bucket_name_violations("my-bucket").is_empty());
        assert_eq!(bucket_name_violations("ab").len(), 1);
        assert!(!bucket_name_violations("Example.com-1-us-east-1").is_empty());
        assert!(!bucket_name_violations("example..com-1-us-east-1").is_empty());
        assert!(!bucket_name_violations("example.-com").is_empty());
        assert!(!bucket_name_violations("-leading").is_empty());
        assert!(!bucket_name_violations("192.168.1.1").is_empty());
        assert!(!bucket_name_violations("xn--bucket").is_empty());
        assert!(!bucket_name_violations(&"a".repeat(64)).is_empty());
    }
}
