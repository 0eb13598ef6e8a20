//! Pieces shared by every gateway flavor: Lambda integration URIs, invoke
//! permissions, access logs, throttling and stage name rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::compute::FunctionHandle;
use crate::synth::intrinsics::{get_att, sub};
use crate::synth::{logical_id, ConstructError, ConstructResult, Resource, Stack};

static STAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid regex"));

/// Access log line written for every request.
pub const ACCESS_LOG_FORMAT: &str = r#"{"requestId":"$context.requestId","ip":"$context.identity.sourceIp","requestTime":"$context.requestTime","httpMethod":"$context.httpMethod","routeKey":"$context.routeKey","status":"$context.status","protocol":"$context.protocol","responseLength":"$context.responseLength","integrationLatency":"$context.integrationLatency"}"#;

/// Streaming integrations may run for the full Lambda timeout.
pub const STREAMING_TIMEOUT_MILLIS: u32 = 900_000;

/// Stage access logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessLogProps {
    pub enabled: bool,
    pub retention_days: u32,
}

impl Default for AccessLogProps {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 14,
        }
    }
}

/// Stage-wide request throttling.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ThrottleProps {
    /// Steady-state requests per second.
    pub rate_limit: f64,
    pub burst_limit: u32,
}

impl ThrottleProps {
    pub(crate) fn validate(&self, construct: &str) -> ConstructResult<()> {
        if !self.rate_limit.is_finite() || self.rate_limit <= 0.0 {
            return Err(ConstructError::invalid(
                construct,
                "throttling.rate_limit",
                "must be positive",
            ));
        }
        if self.burst_limit == 0 {
            return Err(ConstructError::invalid(
                construct,
                "throttling.burst_limit",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// `apigateway:...:lambda:path/...` URI for a function.
///
/// Streaming integrations use the response-streaming invocation path.
pub fn lambda_integration_uri(handle: &FunctionHandle, streaming: bool) -> Value {
    let (version, action) = if streaming {
        ("2021-11-15", "response-streaming-invocations")
    } else {
        ("2015-03-31", "invocations")
    };
    sub(format!(
        "arn:${{AWS::Partition}}:apigateway:${{AWS::Region}}:lambda:path/{version}/functions/${{{}.Arn}}/{action}",
        handle.function_id
    ))
}

/// Execute-api ARN pattern for everything under an API.
pub fn execute_api_arn(api_id: &str, suffix: &str) -> Value {
    sub(format!(
        "arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{api_id}}}/{suffix}"
    ))
}

/// Let API Gateway invoke `handle` for any route of `api_id`.
pub fn add_invoke_permission(
    stack: &mut Stack,
    construct: &str,
    handle: &FunctionHandle,
    api_id: &str,
) -> ConstructResult<String> {
    stack.add_resource(
        logical_id(&[construct, &handle.construct_id, "InvokePermission"]),
        Resource::new(
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": handle.arn(),
                "Principal": "apigateway.amazonaws.com",
                "SourceArn": execute_api_arn(api_id, "*"),
            }),
        ),
    )
}

/// Create the access log group when enabled. Returns its ARN.
pub fn add_access_log_group(
    stack: &mut Stack,
    construct: &str,
    props: &AccessLogProps,
) -> ConstructResult<Option<Value>> {
    if !props.enabled {
        return Ok(None);
    }
    let id = stack.add_resource(
        logical_id(&[construct, "AccessLogs"]),
        Resource::new(
            "AWS::Logs::LogGroup",
            json!({ "RetentionInDays": props.retention_days }),
        )
        .retain(),
    )?;
    Ok(Some(get_att(&id, "Arn")))
}

/// Validate a stage name; `$default` only where the gateway supports it.
pub fn validate_stage_name(
    construct: &str,
    name: &str,
    allow_default: bool,
) -> ConstructResult<()> {
    if allow_default && name == "$default" {
        return Ok(());
    }
    if !STAGE_NAME.is_match(name) {
        return Err(ConstructError::invalid(
            construct,
            "stage_name",
            format!("`{name}` must be letters, digits, hyphens or underscores"),
        ));
    }
    Ok(())
}
