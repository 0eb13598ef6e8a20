//! Lambda function construct.
//!
//! # Responsibilities
//! - Declare the execution role, function, log group and optional function URL
//! - Hand out a [`FunctionHandle`] other constructs use to bind environment
//!   variables and grant permissions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::synth::iam::{assume_role_policy, PolicyStatement, LAMBDA_BASIC_EXECUTION};
use crate::synth::intrinsics::{get_att, reference, sub};
use crate::synth::{logical_id, Construct, ConstructError, ConstructResult, Resource, Stack};

const LOG_RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

/// Instruction set of the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    Arm64,
    X86_64,
}

impl Architecture {
    fn as_str(self) -> &'static str {
        match self {
            Architecture::Arm64 => "arm64",
            Architecture::X86_64 => "x86_64",
        }
    }
}

/// Deployment package location.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CodeLocation {
    pub s3_bucket: String,
    pub s3_key: String,
    #[serde(default)]
    pub s3_object_version: Option<String>,
}

/// Function URL auth type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlAuth {
    #[default]
    None,
    AwsIam,
}

/// Function URL response mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeMode {
    #[default]
    Buffered,
    ResponseStream,
}

impl InvokeMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            InvokeMode::Buffered => "BUFFERED",
            InvokeMode::ResponseStream => "RESPONSE_STREAM",
        }
    }
}

/// Function URL settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FunctionUrlProps {
    pub auth: UrlAuth,
    pub invoke_mode: InvokeMode,
}

/// Props for [`FunctionConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FunctionProps {
    pub id: String,

    /// Physical function name; generated when absent.
    pub function_name: Option<String>,

    pub description: Option<String>,

    /// Runtime identifier (default: "provided.al2023").
    pub runtime: String,

    /// Handler (default: "bootstrap").
    pub handler: String,

    pub architecture: Architecture,

    /// Memory in MB (default: 512).
    pub memory_size: u32,

    /// Timeout in seconds (default: 30).
    pub timeout_secs: u32,

    pub code: Option<CodeLocation>,

    /// Static environment variables.
    pub environment: BTreeMap<String, String>,

    /// Log retention in days (default: 14).
    pub log_retention_days: u32,

    pub reserved_concurrency: Option<u32>,

    /// Attach a function URL when set.
    pub function_url: Option<FunctionUrlProps>,
}

impl Default for FunctionProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            function_name: None,
            description: None,
            runtime: "provided.al2023".to_string(),
            handler: "bootstrap".to_string(),
            architecture: Architecture::default(),
            memory_size: 512,
            timeout_secs: 30,
            code: None,
            environment: BTreeMap::new(),
            log_retention_days: 14,
            reserved_concurrency: None,
            function_url: None,
        }
    }
}

/// Reference to a synthesized function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHandle {
    pub construct_id: String,
    pub function_id: String,
    pub role_id: String,
    pub url_id: Option<String>,
}

impl FunctionHandle {
    pub fn arn(&self) -> Value {
        get_att(&self.function_id, "Arn")
    }

    pub fn name(&self) -> Value {
        reference(&self.function_id)
    }

    /// `FunctionUrl` attribute, when the function declares a URL.
    pub fn url(&self) -> Option<Value> {
        self.url_id.as_deref().map(|id| get_att(id, "FunctionUrl"))
    }

    /// Bind an environment variable on the function.
    ///
    /// Rebinding a key to the same value is a no-op; a different value is a
    /// configuration conflict.
    pub fn bind_environment(
        &self,
        stack: &mut Stack,
        key: &str,
        value: Value,
    ) -> ConstructResult<()> {
        let construct_id = self.construct_id.clone();
        let function = self.function_resource(stack)?;
        let variables = object_entry(&mut function.properties, "Environment")
            .and_then(|environment| object_entry(environment, "Variables"))
            .ok_or_else(|| {
                ConstructError::invalid(&construct_id, "environment", "is not a key/value map")
            })?;
        match variables.get(key) {
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(ConstructError::invalid(
                &construct_id,
                "environment",
                format!("{key} is already bound to a different value"),
            )),
            None => {
                tracing::debug!(function = %construct_id, key, "Binding environment variable");
                variables.insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Append a statement to the function role's inline policy.
    pub fn grant(&self, stack: &mut Stack, statement: PolicyStatement) -> ConstructResult<()> {
        let policy_name = format!("{}DefaultPolicy", self.role_id);
        let role = stack
            .resource_mut(&self.role_id)
            .ok_or_else(|| ConstructError::UnknownReference {
                construct: self.construct_id.clone(),
                kind: "role",
                id: self.role_id.clone(),
            })?;
        let policies = role
            .properties
            .entry("Policies")
            .or_insert_with(|| {
                json!([{
                    "PolicyName": policy_name,
                    "PolicyDocument": { "Version": "2012-10-17", "Statement": [] }
                }])
            });
        let statements = policies
            .get_mut(0)
            .and_then(|p| p.get_mut("PolicyDocument"))
            .and_then(|d| d.get_mut("Statement"))
            .and_then(Value::as_array_mut);
        if let Some(statements) = statements {
            let value = statement.to_value();
            if !statements.contains(&value) {
                statements.push(value);
            }
        }
        Ok(())
    }

    fn function_resource<'a>(&self, stack: &'a mut Stack) -> ConstructResult<&'a mut Resource> {
        stack
            .resource_mut(&self.function_id)
            .ok_or_else(|| ConstructError::UnknownReference {
                construct: self.construct_id.clone(),
                kind: "function",
                id: self.function_id.clone(),
            })
    }
}

fn object_entry<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
) -> Option<&'a mut Map<String, Value>> {
    map.entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

/// Lambda function with its role, log group and optional URL.
#[derive(Debug, Clone)]
pub struct FunctionConstruct {
    pub props: FunctionProps,
}

impl FunctionConstruct {
    pub fn new(props: FunctionProps) -> Self {
        Self { props }
    }

    fn validate(&self) -> ConstructResult<&CodeLocation> {
        let p = &self.props;
        let id = p.id.as_str();
        if id.trim().is_empty() {
            return Err(ConstructError::missing("function", "id"));
        }
        let code = p.code.as_ref().ok_or_else(|| ConstructError::missing(id, "code"))?;
        if code.s3_bucket.trim().is_empty() {
            return Err(ConstructError::missing(id, "code.s3_bucket"));
        }
        if code.s3_key.trim().is_empty() {
            return Err(ConstructError::missing(id, "code.s3_key"));
        }
        if !(128..=10_240).contains(&p.memory_size) {
            return Err(ConstructError::invalid(
                id,
                "memory_size",
                "must be between 128 and 10240 MB",
            ));
        }
        if !(1..=900).contains(&p.timeout_secs) {
            return Err(ConstructError::invalid(
                id,
                "timeout_secs",
                "must be between 1 and 900 seconds",
            ));
        }
        if !LOG_RETENTION_DAYS.contains(&p.log_retention_days) {
            return Err(ConstructError::invalid(
                id,
                "log_retention_days",
                format!("{} is not a supported retention period", p.log_retention_days),
            ));
        }
        if let Some(name) = &p.function_name {
            let valid = !name.is_empty()
                && name.len() <= 64
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                return Err(ConstructError::invalid(
                    id,
                    "function_name",
                    "must be 1-64 characters of letters, digits, hyphens or underscores",
                ));
            }
        }
        Ok(code)
    }

    /// Validate and emit resources, returning the handle registered on the stack.
    pub fn build(&self, stack: &mut Stack) -> ConstructResult<FunctionHandle> {
        let code = self.validate()?;
        let p = &self.props;
        let role_id = logical_id(&[&p.id, "ServiceRole"]);
        let function_id = logical_id(&[&p.id, "Function"]);
        let log_group_id = logical_id(&[&p.id, "LogGroup"]);

        stack.add_resource(
            role_id.clone(),
            Resource::new(
                "AWS::IAM::Role",
                json!({
                    "AssumeRolePolicyDocument": assume_role_policy("lambda.amazonaws.com"),
                    "ManagedPolicyArns": [sub(LAMBDA_BASIC_EXECUTION)],
                }),
            ),
        )?;

        stack.add_resource(
            log_group_id.clone(),
            Resource::new(
                "AWS::Logs::LogGroup",
                json!({ "RetentionInDays": p.log_retention_days }),
            )
            .retain(),
        )?;

        let mut code_value = json!({ "S3Bucket": code.s3_bucket, "S3Key": code.s3_key });
        if let Some(version) = &code.s3_object_version {
            code_value["S3ObjectVersion"] = json!(version);
        }

        let mut function = Resource::new(
            "AWS::Lambda::Function",
            json!({
                "Code": code_value,
                "Role": get_att(&role_id, "Arn"),
                "Runtime": p.runtime,
                "Handler": p.handler,
                "Architectures": [p.architecture.as_str()],
                "MemorySize": p.memory_size,
                "Timeout": p.timeout_secs,
                "LoggingConfig": { "LogGroup": reference(&log_group_id) },
            }),
        )
        .depends_on(role_id.clone());
        if let Some(name) = &p.function_name {
            function.set("FunctionName", json!(name));
        }
        if let Some(description) = &p.description {
            function.set("Description", json!(description));
        }
        if let Some(concurrency) = p.reserved_concurrency {
            function.set("ReservedConcurrentExecutions", json!(concurrency));
        }
        if !p.environment.is_empty() {
            function.set("Environment", json!({ "Variables": p.environment }));
        }
        stack.add_resource(function_id.clone(), function)?;

        let mut handle = FunctionHandle {
            construct_id: p.id.clone(),
            function_id,
            role_id,
            url_id: None,
        };

        if let Some(url) = p.function_url {
            handle.url_id = Some(add_function_url(stack, &handle, url)?);
        }

        stack.add_exported_output(
            logical_id(&[&p.id, "FunctionName"]),
            handle.name(),
            "Function name",
        )?;
        stack.add_exported_output(
            logical_id(&[&p.id, "FunctionArn"]),
            handle.arn(),
            "Function ARN",
        )?;
        if let Some(url) = handle.url() {
            stack.add_exported_output(logical_id(&[&p.id, "FunctionUrl"]), url, "Function URL")?;
        }

        stack.register_function(&p.id, handle.clone())?;
        Ok(handle)
    }
}

/// Declare a function URL (plus public invoke permission for unauthenticated URLs).
pub(crate) fn add_function_url(
    stack: &mut Stack,
    handle: &FunctionHandle,
    props: FunctionUrlProps,
) -> ConstructResult<String> {
    let auth = match props.auth {
        UrlAuth::None => "NONE",
        UrlAuth::AwsIam => "AWS_IAM",
    };
    let url_id = stack.add_resource(
        logical_id(&[&handle.construct_id, "Url"]),
        Resource::new(
            "AWS::Lambda::Url",
            json!({
                "TargetFunctionArn": handle.arn(),
                "AuthType": auth,
                "InvokeMode": props.invoke_mode.as_str(),
            }),
        ),
    )?;
    if props.auth == UrlAuth::None {
        stack.add_resource(
            logical_id(&[&handle.construct_id, "UrlPermission"]),
            Resource::new(
                "AWS::Lambda::Permission",
                json!({
                    "Action": "lambda:InvokeFunctionUrl",
                    "FunctionName": handle.arn(),
                    "Principal": "*",
                    "FunctionUrlAuthType": "NONE",
                }),
            ),
        )?;
    }
    Ok(url_id)
}

impl Construct for FunctionConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "function"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        self.build(stack).map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::synth::iam::SECRET_READ_ACTIONS;
    use crate::synth::StackContext;

    pub(crate) fn function_props(id: &str) -> FunctionProps {
        FunctionProps {
            id: id.to_string(),
            code: Some(CodeLocation {
                s3_bucket: "artifacts".into(),
                s3_key: format!("{id}.zip"),
                s3_object_version: None,
            }),
            ..Default::default()
        }
    }

    /// Stack with the given functions already declared.
    pub(crate) fn stack_with_functions(ids: &[&str]) -> Stack {
        let mut stack = Stack::new(StackContext::new("test", "us-east-1"));
        for id in ids {
            stack.add(&FunctionConstruct::new(function_props(id))).unwrap();
        }
        stack
    }

    #[test]
    fn test_function_resources() {
        let stack = stack_with_functions(&["api"]);
        let template = stack.template();

        let function = &template.resources["ApiFunction"];
        assert_eq!(function.resource_type, "AWS::Lambda::Function");
        assert_eq!(function.get("Runtime").unwrap(), "provided.al2023");
        assert_eq!(function.get("Architectures").unwrap(), &json!(["arm64"]));
        assert_eq!(function.get("MemorySize").unwrap(), 512);
        assert_eq!(function.depends_on, vec!["ApiServiceRole".to_string()]);
        assert!(function.get("Environment").is_none());

        let role = &template.resources["ApiServiceRole"];
        assert!(role.get("Policies").is_none());
        assert!(template.outputs.contains_key("ApiFunctionArn"));
        assert_eq!(template.resources["ApiLogGroup"].get("RetentionInDays").unwrap(), 14);
    }

    #[test]
    fn test_missing_code() {
        let mut stack = Stack::new(StackContext::default());
        let props = FunctionProps {
            id: "api".into(),
            ..Default::default()
        };
        let err = stack.add(&FunctionConstruct::new(props)).unwrap_err();
        assert_eq!(err, ConstructError::missing("api", "code"));
    }

    #[test]
    fn test_invalid_limits() {
        let mut stack = Stack::new(StackContext::default());
        let mut props = function_props("api");
        props.timeout_secs = 901;
        assert!(matches!(
            stack.add(&FunctionConstruct::new(props)),
            Err(ConstructError::Invalid { field: "timeout_secs", .. })
        ));

        let mut props = function_props("api");
        props.log_retention_days = 2;
        assert!(matches!(
            stack.add(&FunctionConstruct::new(props)),
            Err(ConstructError::Invalid { field: "log_retention_days", .. })
        ));
    }

    #[test]
    fn test_bind_environment_conflict() {
        let mut stack = stack_with_functions(&["api"]);
        let handle = stack.function("test", "api").unwrap();

        handle.bind_environment(&mut stack, "DYNAMODB_TABLE", json!({ "Ref": "A" })).unwrap();
        handle.bind_environment(&mut stack, "DYNAMODB_TABLE", json!({ "Ref": "A" })).unwrap();
        let err = handle
            .bind_environment(&mut stack, "DYNAMODB_TABLE", json!({ "Ref": "B" }))
            .unwrap_err();
        assert!(err.to_string().contains("DYNAMODB_TABLE is already bound"));

        let function = &stack.template().resources["ApiFunction"];
        assert_eq!(
            function.get("Environment").unwrap(),
            &json!({ "Variables": { "DYNAMODB_TABLE": { "Ref": "A" } } })
        );
    }

    #[test]
    fn test_static_environment_conflicts_with_binding() {
        let mut stack = Stack::new(StackContext::default());
        let mut props = function_props("api");
        props.environment.insert("MCP_ENDPOINT".into(), "https://static".into());
        let handle = FunctionConstruct::new(props).build(&mut stack).unwrap();
        assert!(handle
            .bind_environment(&mut stack, "MCP_ENDPOINT", json!("https://other"))
            .is_err());
    }

    #[test]
    fn test_grant_creates_policy_once() {
        let mut stack = stack_with_functions(&["api"]);
        let handle = stack.function("test", "api").unwrap();
        let stmt = PolicyStatement::allow(SECRET_READ_ACTIONS, vec![json!("arn:secret")]);
        handle.grant(&mut stack, stmt.clone()).unwrap();
        handle.grant(&mut stack, stmt).unwrap();

        let role = &stack.template().resources["ApiServiceRole"];
        let statements = &role.get("Policies").unwrap()[0]["PolicyDocument"]["Statement"];
        assert_eq!(statements.as_array().unwrap().len(), 1);
        assert_eq!(role.get("Policies").unwrap()[0]["PolicyName"], "ApiServiceRoleDefaultPolicy");
    }

    #[test]
    fn test_function_url() {
        let mut stack = Stack::new(StackContext::default());
        let mut props = function_props("ssr");
        props.function_url = Some(FunctionUrlProps {
            auth: UrlAuth::None,
            invoke_mode: InvokeMode::ResponseStream,
        });
        let handle = FunctionConstruct::new(props).build(&mut stack).unwrap();
        assert_eq!(handle.url_id.as_deref(), Some("SsrUrl"));
        let url = &stack.template().resources["SsrUrl"];
        assert_eq!(url.get("InvokeMode").unwrap(), "RESPONSE_STREAM");
        assert!(stack.template().resources.contains_key("SsrUrlPermission"));
    }
}
