use super::*;

/// inline (`ZipFile`) code is limited to 4096 characters by cloudformation.
pub const MAX_INLINE_CODE_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Runtime {
    #[default]
    Nodejs20x,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Nodejs20x => "nodejs20.x",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionProps {
    pub description: Option<String>,
    pub runtime: Runtime,
    pub handler: String,
    pub inline_code: String,
    pub timeout_seconds: u32,
    pub role: Arc<Role>,
}

#[derive(Debug)]
pub struct Function {
    logical_id: String,
    pub props: FunctionProps,
}

impl Function {
    pub fn declare(scope: &mut Scope, id: &str, props: FunctionProps) -> Arc<Function> {
        let logical_id = scope.logical_id(id);
        scope.add(Function { logical_id, props })
    }

    pub fn arn(&self) -> Value {
        get_att(&self.logical_id, "Arn")
    }
}

impl CfnResource for Function {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn type_string(&self) -> &'static str {
        "AWS::Lambda::Function"
    }

    fn properties(&self) -> Value {
        let mut map = Map::new();
        map.insert("Runtime".to_string(), Value::String(self.props.runtime.as_str().into()));
        map.insert("Handler".to_string(), Value::String(self.props.handler.clone()));
        map.insert("Role".to_string(), self.props.role.arn());
        map.insert("Timeout".to_string(), json!(self.props.timeout_seconds));
        map.insert("Code".to_string(), json!({ "ZipFile": self.props.inline_code }));
        if let Some(description) = &self.props.description {
            map.insert("Description".to_string(), Value::String(description.clone()));
        }
        Value::Object(map)
    }

    // the role's inline policy has to exist before the function can use it
    fn depends_on(&self) -> Vec<String> {
        vec![self.props.role.logical_id().to_string()]
    }

    fn validate(&self) -> Result<(), String> {
        if self.props.inline_code.len() > MAX_INLINE_CODE_LEN {
            return Err(format!(
                "Inline code is {} characters long, cloudformation only allows {MAX_INLINE_CODE_LEN}",
                self.props.inline_code.len()
            ));
        }
        if !(1..=900).contains(&self.props.timeout_seconds) {
            return Err(format!("Timeout must be between 1 and 900 seconds, found {}", self.props.timeout_seconds));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Environment;

    fn function(code: &str, timeout_seconds: u32) -> Arc<Function> {
        let stack = Stack::new("test", Environment::new("1", "us-east-1")).unwrap();
        let mut scope = stack.scope("site");
        let role = Role::declare(&mut scope, "Role", RoleProps {
            service: "lambda.amazonaws.com".into(),
            ..Default::default()
        });
        Function::declare(&mut scope, "Fn", FunctionProps {
            description: None,
            runtime: Runtime::Nodejs20x,
            handler: "index.handler".into(),
            inline_code: code.into(),
            timeout_seconds,
            role,
        })
    }

    #[test]
    fn function_properties() {
        let f = function("exports.handler = async () => {}", 30);
        let props = f.properties();
        assert_eq!(props["Runtime"], "nodejs20.x");
        assert_eq!(props["Code"]["ZipFile"], "exports.handler = async () => {}");
        assert_eq!(props["Role"], f.props.role.arn());
        assert_eq!(f.depends_on(), vec![f.props.role.logical_id().to_string()]);
        assert!(f.validate().is_ok());
    }

    #[test]
    fn inline_code_and_timeout_limits() {
        assert!(function(&"x".repeat(MAX_INLINE_CODE_LEN + 1), 30).validate().is_err());
        assert!(function("x", 0).validate().is_err());
        assert!(function("x", 901).validate().is_err());
    }
}
