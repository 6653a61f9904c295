use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assets::AssetSource;
use crate::error::{Result, SiteError};
use crate::variables::Environment;

pub const TEMPLATE_VERSION: &str = "2010-09-09";

/// Anything that ends up as an entry in the `Resources` section of a template.
pub trait CfnResource: std::fmt::Debug + Send + Sync {
    fn logical_id(&self) -> &str;
    fn type_string(&self) -> &'static str;
    fn properties(&self) -> Value;
    /// logical ids this resource must be applied after, on top of
    /// whatever the `Ref`/`GetAtt`s in its properties already imply.
    fn depends_on(&self) -> Vec<String> {
        vec![]
    }
    fn removal_policy(&self) -> Option<RemovalPolicy> {
        None
    }
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// What happens to the underlying data once the resource leaves the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalPolicy {
    Destroy,
    #[default]
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    pub fn as_cfn(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    pub fn string<S: AsRef<str>>(description: S) -> Self {
        Self {
            ty: "String".to_string(),
            description: Some(description.as_ref().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(rename = "UpdateReplacePolicy", default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutput {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, SavedResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, ResourceOutput>,
}

impl Default for SavedTemplate {
    fn default() -> Self {
        Self {
            version: TEMPLATE_VERSION.to_string(),
            description: None,
            parameters: Default::default(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

/// Staging area for the declarations of one construct.
/// Nothing in here is visible to the stack until `Stack::commit`.
#[derive(Debug)]
pub struct Scope {
    id: String,
    env: Environment,
    resources: Vec<Arc<dyn CfnResource>>,
    parameters: Vec<(String, Parameter)>,
    assets: Vec<AssetSource>,
}

impl Scope {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// A template-safe, deterministic logical id for a child of this scope:
    /// the alphanumeric characters of the path followed by a short hash of
    /// the full path, so that ids differing only in punctuation don't collide.
    pub fn logical_id(&self, child: &str) -> String {
        let path = format!("{}/{}", self.id, child);
        let mut human: String = path.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        human.truncate(240);
        let hash = adler::adler32_slice(path.as_bytes());
        format!("{human}{hash:08X}")
    }

    pub fn add<R: CfnResource + 'static>(&mut self, resource: R) -> Arc<R> {
        let resource = Arc::new(resource);
        tracing::debug!(
            logical_id = resource.logical_id(),
            ty = resource.type_string(),
            "declared resource"
        );
        self.resources.push(resource.clone() as Arc<dyn CfnResource>);
        resource
    }

    pub fn add_parameter<S: AsRef<str>>(&mut self, name: S, parameter: Parameter) {
        self.parameters.push((name.as_ref().to_string(), parameter));
    }

    pub fn add_asset(&mut self, asset: AssetSource) {
        self.add_parameter(&asset.bucket_parameter, Parameter::string(format!("S3 bucket holding asset {}", asset.id)));
        self.add_parameter(&asset.key_parameter, Parameter::string(format!("S3 key of asset {}", asset.id)));
        self.assets.push(asset);
    }

    pub fn resources(&self) -> &[Arc<dyn CfnResource>] {
        &self.resources
    }
}

/// The declarative resource graph for one CloudFormation stack.
#[derive(Debug)]
pub struct Stack {
    name: String,
    env: Environment,
    description: Option<String>,
    resources: Vec<Arc<dyn CfnResource>>,
    parameters: BTreeMap<String, Parameter>,
    outputs: BTreeMap<String, ResourceOutput>,
    assets: Vec<AssetSource>,
}

impl Stack {
    pub fn new<S: AsRef<str>>(name: S, env: Environment) -> Result<Self> {
        let name = validate_stack_name(name.as_ref())?;
        Ok(Self {
            name,
            env,
            description: None,
            resources: vec![],
            parameters: Default::default(),
            outputs: Default::default(),
            assets: vec![],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn set_description<S: AsRef<str>>(&mut self, description: S) {
        self.description = Some(description.as_ref().to_string());
    }

    pub fn resources(&self) -> &[Arc<dyn CfnResource>] {
        &self.resources
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Arc<dyn CfnResource>> {
        self.resources.iter().find(|r| r.logical_id() == logical_id)
    }

    pub fn assets(&self) -> &[AssetSource] {
        &self.assets
    }

    pub fn scope<S: AsRef<str>>(&self, id: S) -> Scope {
        Scope {
            id: id.as_ref().to_string(),
            env: self.env.clone(),
            resources: vec![],
            parameters: vec![],
            assets: vec![],
        }
    }

    /// publishes everything staged in `scope`. Either all of it lands in the
    /// stack or, on error, none of it does.
    pub fn commit(&mut self, scope: Scope) -> Result<()> {
        let mut seen: HashSet<&str> = self.resources.iter().map(|r| r.logical_id()).collect();
        for resource in &scope.resources {
            if !seen.insert(resource.logical_id()) {
                return Err(SiteError::DuplicateLogicalId(resource.logical_id().to_string()));
            }
        }
        let mut staged_params: BTreeMap<&str, &Parameter> = BTreeMap::new();
        for (name, param) in &scope.parameters {
            let existing = self.parameters.get(name).or_else(|| staged_params.get(name.as_str()).copied());
            match existing {
                Some(existing) if existing != param => {
                    return Err(SiteError::ConflictingParameter(name.clone()));
                }
                _ => {
                    staged_params.insert(name.as_str(), param);
                }
            }
        }
        let mut asset_ids: HashSet<&str> = self.assets.iter().map(|a| a.id.as_str()).collect();
        for asset in &scope.assets {
            if !asset_ids.insert(asset.id.as_str()) {
                return Err(SiteError::DuplicateAsset(asset.id.clone()));
            }
        }

        let Scope { id, resources, parameters, assets, .. } = scope;
        tracing::info!(construct = %id, resources = resources.len(), assets = assets.len(), "committed construct");
        self.resources.extend(resources);
        self.parameters.extend(parameters);
        self.assets.extend(assets);
        Ok(())
    }

    pub fn add_output<S: AsRef<str>, S1: AsRef<str>>(&mut self, name: S, description: S1, value: Value) -> Result<()> {
        let name = name.as_ref();
        if self.outputs.contains_key(name) {
            return Err(SiteError::DuplicateLogicalId(name.to_string()));
        }
        self.outputs.insert(name.to_string(), ResourceOutput {
            description: description.as_ref().to_string(),
            value,
        });
        Ok(())
    }

    pub fn to_template(&self) -> Result<SavedTemplate> {
        let mut out_template = SavedTemplate {
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            outputs: self.outputs.clone(),
            ..Default::default()
        };
        for resource in self.resources.iter() {
            let logical_id = resource.logical_id();
            resource.validate().map_err(|e| SiteError::invalid_resource(logical_id, e))?;
            let depends_on = resource.depends_on();
            if let Some(missing) = depends_on.iter().find(|d| self.resource(d).is_none()) {
                return Err(SiteError::invalid_resource(logical_id, format!("depends on unknown resource '{missing}'")));
            }
            let policy = resource.removal_policy().map(|p| p.as_cfn().to_string());
            let saved_resource = SavedResource {
                ty: resource.type_string().to_string(),
                properties: resource.properties(),
                depends_on,
                deletion_policy: policy.clone(),
                update_replace_policy: policy,
            };
            out_template.resources.insert(logical_id.to_string(), saved_resource);
        }
        Ok(out_template)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_template()?)?)
    }
}

fn validate_stack_name(stack_name: &str) -> Result<String> {
    // A stack name can contain only alphanumeric characters (case sensitive) and hyphens.
    // It must start with an alphabetical character and can't be longer than 128 characters.
    let starts_with_letter = stack_name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_chars = stack_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !starts_with_letter || !valid_chars || stack_name.len() > 128 {
        return Err(SiteError::InvalidStackName(stack_name.to_string()));
    }
    Ok(stack_name.to_string())
}
