//! CloudFormation intrinsic functions and IAM policy documents, rendered
//! straight to `serde_json::Value`.

use serde_json::{json, Map, Value};

pub const POLICY_VERSION: &str = "2012-10-17";

/// `{ "Ref": logical_id }`
pub fn get_ref(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{ "Fn::GetAtt": [logical_id, attribute] }`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{ "Fn::Join": [delimiter, parts] }`
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{ "Fn::Sub": template }`
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// who a statement applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    /// canonical user id, as handed out for cloudfront origin access identities.
    CanonicalUser(Value),
    Service(String),
    Aws(Value),
}

impl Principal {
    pub fn to_value(&self) -> Value {
        match self {
            Principal::CanonicalUser(id) => json!({ "CanonicalUser": id }),
            Principal::Service(svc) => json!({ "Service": svc }),
            Principal::Aws(arn) => json!({ "AWS": arn }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
    /// empty for identity policies (ie: inline role policies).
    pub principals: Vec<Principal>,
}

impl PolicyStatement {
    pub fn allow<S: AsRef<str>>(actions: &[S], resources: Vec<Value>) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.iter().map(|a| a.as_ref().to_string()).collect(),
            resources,
            principals: vec![],
        }
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.push(principal);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut statement = Map::new();
        statement.insert("Effect".to_string(), Value::String(self.effect.as_str().to_string()));
        statement.insert("Action".to_string(), one_or_many(self.actions.iter().map(|a| Value::String(a.clone())).collect()));
        if !self.resources.is_empty() {
            statement.insert("Resource".to_string(), one_or_many(self.resources.clone()));
        }
        // a single principal is rendered as an object, several get merged
        // the way IAM expects: { "AWS": [...], "Service": [...] }
        if !self.principals.is_empty() {
            let mut merged = Map::new();
            for principal in &self.principals {
                if let Value::Object(obj) = principal.to_value() {
                    for (kind, id) in obj {
                        match merged.get_mut(&kind) {
                            Some(Value::Array(list)) => list.push(id),
                            Some(existing) => {
                                let first = existing.take();
                                *existing = Value::Array(vec![first, id]);
                            }
                            None => {
                                merged.insert(kind, id);
                            }
                        }
                    }
                }
            }
            statement.insert("Principal".to_string(), Value::Object(merged));
        }
        Value::Object(statement)
    }
}

fn one_or_many(mut values: Vec<Value>) -> Value {
    if values.len() == 1 {
        values.remove(0)
    } else {
        Value::Array(values)
    }
}

pub fn create_policy_doc(statements: &[PolicyStatement]) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": statements.iter().map(PolicyStatement::to_value).collect::<Vec<_>>(),
    })
}
