use super::*;

pub const BASIC_EXECUTION_POLICY: &str = "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

#[derive(Debug, Clone, Default)]
pub struct RoleProps {
    pub description: Option<String>,
    /// the service principal allowed to assume this role, ie: lambda.amazonaws.com
    pub service: String,
    pub managed_policy_arns: Vec<Value>,
    /// (policy name, statements)
    pub inline_policies: Vec<(String, Vec<PolicyStatement>)>,
}

#[derive(Debug)]
pub struct Role {
    logical_id: String,
    pub props: RoleProps,
}

impl Role {
    pub fn declare(scope: &mut Scope, id: &str, props: RoleProps) -> Arc<Role> {
        let logical_id = scope.logical_id(id);
        scope.add(Role { logical_id, props })
    }

    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }

    fn assume_role_policy_doc(&self) -> Value {
        create_policy_doc(&[
            PolicyStatement::allow(&["sts:AssumeRole"], vec![])
                .with_principal(Principal::Service(self.props.service.clone())),
        ])
    }
}

impl CfnResource for Role {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn type_string(&self) -> &'static str {
        "AWS::IAM::Role"
    }

    fn properties(&self) -> Value {
        let mut map = Map::new();
        map.insert("AssumeRolePolicyDocument".to_string(), self.assume_role_policy_doc());
        if let Some(description) = &self.props.description {
            map.insert("Description".to_string(), Value::String(description.clone()));
        }
        if !self.props.managed_policy_arns.is_empty() {
            map.insert("ManagedPolicyArns".to_string(), Value::Array(self.props.managed_policy_arns.clone()));
        }
        if !self.props.inline_policies.is_empty() {
            let policies = self.props.inline_policies.iter()
                .map(|(name, statements)| json!({
                    "PolicyName": name,
                    "PolicyDocument": create_policy_doc(statements),
                }))
                .collect();
            map.insert("Policies".to_string(), Value::Array(policies));
        }
        Value::Object(map)
    }

    fn validate(&self) -> Result<(), String> {
        if self.props.service.is_empty() {
            return Err("A role must name the service allowed to assume it".into());
        }
        Ok(())
    }
}
