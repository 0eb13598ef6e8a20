//! WebSocket API construct.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::domain::{add_custom_domain, CustomDomainProps, GatewayFlavor};
use crate::api::integration::{
    add_access_log_group, add_invoke_permission, execute_api_arn, lambda_integration_uri,
    validate_stage_name, AccessLogProps, ThrottleProps, ACCESS_LOG_FORMAT,
};
use crate::compute::FunctionHandle;
use crate::synth::error::require;
use crate::synth::iam::{PolicyStatement, MANAGE_CONNECTIONS_ACTIONS};
use crate::synth::intrinsics::{execute_api_url, join, reference};
use crate::synth::{logical_id, Construct, ConstructError, ConstructResult, Resource, Stack};

const RESERVED_ROUTES: [&str; 3] = ["$connect", "$disconnect", "$default"];

fn default_stage_name() -> String {
    "prod".to_string()
}

fn default_route_selection() -> String {
    "$request.body.action".to_string()
}

/// A custom route handled by its own function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketRoute {
    pub route_key: String,
    pub handler: String,
}

/// Props for [`WebSocketApiConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketApiProps {
    pub id: String,
    pub api_name: Option<String>,
    /// Function handling `$connect`, `$disconnect` and `$default`.
    pub handler: Option<String>,
    pub routes: Vec<WebSocketRoute>,
    /// Default: "$request.body.action".
    pub route_selection_expression: String,
    /// Default: "prod".
    pub stage_name: String,
    pub access_logs: AccessLogProps,
    pub throttling: Option<ThrottleProps>,
    pub domain: Option<CustomDomainProps>,
}

impl Default for WebSocketApiProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            api_name: None,
            handler: None,
            routes: Vec::new(),
            route_selection_expression: default_route_selection(),
            stage_name: default_stage_name(),
            access_logs: AccessLogProps::default(),
            throttling: None,
            domain: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSocketApiConstruct {
    pub props: WebSocketApiProps,
}

impl WebSocketApiConstruct {
    pub fn new(props: WebSocketApiProps) -> Self {
        Self { props }
    }

    /// Route keys paired with their handler ids, reserved routes first.
    fn route_table<'a>(&'a self, main: &'a str) -> ConstructResult<Vec<(&'a str, &'a str)>> {
        let p = &self.props;
        let mut routes: Vec<(&str, &str)> = RESERVED_ROUTES.iter().map(|r| (*r, main)).collect();
        for route in &p.routes {
            let key = route.route_key.trim();
            if key.is_empty() {
                return Err(ConstructError::missing(&p.id, "routes.route_key"));
            }
            if RESERVED_ROUTES.contains(&key) {
                return Err(ConstructError::invalid(
                    &p.id,
                    "routes",
                    format!("`{key}` is always routed to the main handler"),
                ));
            }
            if routes.iter().any(|(existing, _)| *existing == key) {
                return Err(ConstructError::invalid(
                    &p.id,
                    "routes",
                    format!("route `{key}` is declared more than once"),
                ));
            }
            // Route resources are named after the key's alphanumeric characters.
            if let Some((existing, _)) = routes
                .iter()
                .find(|(existing, _)| logical_id(&[*existing]) == logical_id(&[key]))
            {
                return Err(ConstructError::invalid(
                    &p.id,
                    "routes",
                    format!("route `{key}` and `{existing}` would share the resource name"),
                ));
            }
            routes.push((key, require(&p.id, "routes.handler", Some(route.handler.as_str()))?));
        }
        Ok(routes)
    }
}

impl Construct for WebSocketApiConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "websocket_api"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let main = require(&p.id, "handler", p.handler.as_deref())?;
        let routes = self.route_table(main)?;
        validate_stage_name(&p.id, &p.stage_name, false)?;
        if let Some(throttling) = &p.throttling {
            throttling.validate(&p.id)?;
        }
        if let Some(domain) = &p.domain {
            domain.certificate_arn(stack, &p.id)?;
        }

        // Distinct handlers in first-use order.
        let mut handles: Vec<FunctionHandle> = Vec::new();
        for &(_, handler) in &routes {
            if !handles.iter().any(|h| h.construct_id == handler) {
                handles.push(stack.function(&p.id, handler)?);
            }
        }

        let name = p
            .api_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", stack.context().name, p.id));
        let api_id = stack.add_resource(
            logical_id(&[&p.id, "Api"]),
            Resource::new(
                "AWS::ApiGatewayV2::Api",
                json!({
                    "Name": name,
                    "ProtocolType": "WEBSOCKET",
                    "RouteSelectionExpression": p.route_selection_expression,
                }),
            ),
        )?;

        let mut integration_ids = Vec::with_capacity(handles.len());
        for handle in &handles {
            let id = stack.add_resource(
                logical_id(&[&p.id, &handle.construct_id, "Integration"]),
                Resource::new(
                    "AWS::ApiGatewayV2::Integration",
                    json!({
                        "ApiId": reference(&api_id),
                        "IntegrationType": "AWS_PROXY",
                        "IntegrationUri": lambda_integration_uri(handle, false),
                    }),
                ),
            )?;
            integration_ids.push((handle.construct_id.clone(), id));
        }

        let mut deployment = Resource::new(
            "AWS::ApiGatewayV2::Deployment",
            json!({ "ApiId": reference(&api_id) }),
        );
        for &(route_key, handler) in &routes {
            let integration_id = integration_ids
                .iter()
                .find(|(function, _)| function == handler)
                .map(|(_, id)| id.as_str())
                .ok_or_else(|| ConstructError::UnknownReference {
                    construct: p.id.clone(),
                    kind: "function",
                    id: handler.to_string(),
                })?;
            let route_id = stack.add_resource(
                logical_id(&[&p.id, route_key, "Route"]),
                Resource::new(
                    "AWS::ApiGatewayV2::Route",
                    json!({
                        "ApiId": reference(&api_id),
                        "RouteKey": route_key,
                        "Target": join("/", vec![json!("integrations"), reference(integration_id)]),
                    }),
                ),
            )?;
            deployment = deployment.depends_on(route_id);
        }
        let deployment_id = stack.add_resource(logical_id(&[&p.id, "Deployment"]), deployment)?;

        let mut stage = json!({
            "ApiId": reference(&api_id),
            "StageName": p.stage_name,
            "DeploymentId": reference(&deployment_id),
        });
        if let Some(log_arn) = add_access_log_group(stack, &p.id, &p.access_logs)? {
            stage["AccessLogSettings"] = json!({
                "DestinationArn": log_arn,
                "Format": ACCESS_LOG_FORMAT,
            });
        }
        if let Some(throttling) = &p.throttling {
            stage["DefaultRouteSettings"] = json!({
                "ThrottlingRateLimit": throttling.rate_limit,
                "ThrottlingBurstLimit": throttling.burst_limit,
            });
        }
        let stage_id = stack.add_resource(
            logical_id(&[&p.id, "Stage"]),
            Resource::new("AWS::ApiGatewayV2::Stage", stage),
        )?;

        let connections_arn =
            execute_api_arn(&api_id, &format!("{}/POST/@connections/*", p.stage_name));
        for handle in &handles {
            add_invoke_permission(stack, &p.id, handle, &api_id)?;
            handle.grant(
                stack,
                PolicyStatement::allow(MANAGE_CONNECTIONS_ACTIONS, vec![connections_arn.clone()]),
            )?;
        }

        let (wss_url, callback_url) = match &p.domain {
            Some(domain) => {
                let domain =
                    add_custom_domain(stack, &p.id, domain, GatewayFlavor::V2, &api_id, &stage_id)?;
                (json!(domain.url("wss", "")), json!(domain.url("https", "")))
            }
            None => {
                let stage_path = format!("/{}", p.stage_name);
                (
                    execute_api_url("wss", &api_id, &stage_path),
                    execute_api_url("https", &api_id, &stage_path),
                )
            }
        };

        stack.add_exported_output(
            logical_id(&[&p.id, "ApiId"]),
            reference(&api_id),
            "WebSocket API id",
        )?;
        stack.add_exported_output(logical_id(&[&p.id, "WebSocketUrl"]), wss_url, "WebSocket URL")?;
        stack.add_exported_output(
            logical_id(&[&p.id, "CallbackUrl"]),
            callback_url,
            "Connection management callback URL",
        )
    }
}
