//! MCP server endpoint: an HTTP API exposing one path to one function.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::domain::CustomDomainProps;
use crate::api::http::{build_http_api, HttpApiSpec};
use crate::api::integration::{AccessLogProps, ThrottleProps};
use crate::synth::error::require;
use crate::synth::intrinsics::execute_api_url;
use crate::synth::{logical_id, Construct, ConstructError, ConstructResult, Stack};

/// Environment key carrying the public endpoint URL.
pub const MCP_ENDPOINT_ENV: &str = "MCP_ENDPOINT";

fn default_path() -> String {
    "/mcp".to_string()
}

/// Props for [`McpServerConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct McpServerProps {
    pub id: String,
    pub api_name: Option<String>,
    /// Id of the function serving the protocol.
    pub handler: Option<String>,
    /// Default: "/mcp".
    pub path: String,
    pub access_logs: AccessLogProps,
    pub throttling: Option<ThrottleProps>,
    pub domain: Option<CustomDomainProps>,
}

impl Default for McpServerProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            api_name: None,
            handler: None,
            path: default_path(),
            access_logs: AccessLogProps::default(),
            throttling: None,
            domain: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct McpServerConstruct {
    pub props: McpServerProps,
}

impl McpServerConstruct {
    pub fn new(props: McpServerProps) -> Self {
        Self { props }
    }
}

impl Construct for McpServerConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "mcp_server"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let handler = require(&p.id, "handler", p.handler.as_deref())?;
        let handle = stack.function(&p.id, handler)?;
        let path = p.path.trim();
        if !path.starts_with('/') || path.len() < 2 || path.contains(char::is_whitespace) {
            return Err(ConstructError::invalid(
                &p.id,
                "path",
                format!("`{path}` must be an absolute path like /mcp"),
            ));
        }
        let name = p
            .api_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", stack.context().name, p.id));

        let ids = build_http_api(
            stack,
            &handle,
            HttpApiSpec {
                construct: &p.id,
                name,
                description: Some("Model Context Protocol endpoint"),
                route_keys: vec![format!("ANY {path}")],
                stage_name: "$default",
                cors: None,
                access_logs: &p.access_logs,
                throttling: p.throttling.as_ref(),
                domain: p.domain.as_ref(),
            },
        )?;

        let endpoint = match &ids.domain {
            Some(domain) => json!(domain.url("https", path)),
            None => execute_api_url("https", &ids.api_id, path),
        };
        handle.bind_environment(stack, MCP_ENDPOINT_ENV, endpoint.clone())?;
        stack.add_exported_output(logical_id(&[&p.id, "Endpoint"]), endpoint, "MCP endpoint")
    }
}
