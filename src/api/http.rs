//! HTTP API (API Gateway v2) construct.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::domain::{add_custom_domain, CustomDomain, CustomDomainProps, GatewayFlavor};
use crate::api::integration::{
    add_access_log_group, add_invoke_permission, validate_stage_name, AccessLogProps,
    ThrottleProps, ACCESS_LOG_FORMAT,
};
use crate::compute::FunctionHandle;
use crate::synth::error::require;
use crate::synth::intrinsics::{execute_api_url, join, reference};
use crate::synth::{logical_id, Construct, ConstructError, ConstructResult, Resource, Stack};

fn default_stage_name() -> String {
    "$default".to_string()
}

/// Browser cross-origin settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsProps {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: Option<u32>,
}

impl CorsProps {
    fn to_value(&self, construct: &str) -> ConstructResult<Value> {
        if self.allow_origins.is_empty() {
            return Err(ConstructError::missing(construct, "cors.allow_origins"));
        }
        if self.allow_credentials && self.allow_origins.iter().any(|o| o == "*") {
            return Err(ConstructError::invalid(
                construct,
                "cors.allow_origins",
                "`*` cannot be combined with allow_credentials",
            ));
        }
        let mut value = json!({
            "AllowOrigins": self.allow_origins,
            "AllowCredentials": self.allow_credentials,
        });
        if !self.allow_methods.is_empty() {
            value["AllowMethods"] = json!(self.allow_methods);
        }
        if !self.allow_headers.is_empty() {
            value["AllowHeaders"] = json!(self.allow_headers);
        }
        if !self.expose_headers.is_empty() {
            value["ExposeHeaders"] = json!(self.expose_headers);
        }
        if let Some(max_age) = self.max_age_secs {
            value["MaxAge"] = json!(max_age);
        }
        Ok(value)
    }
}

/// Everything needed to lay down a single-integration HTTP API.
pub(crate) struct HttpApiSpec<'a> {
    pub construct: &'a str,
    pub name: String,
    pub description: Option<&'a str>,
    pub route_keys: Vec<String>,
    pub stage_name: &'a str,
    pub cors: Option<&'a CorsProps>,
    pub access_logs: &'a AccessLogProps,
    pub throttling: Option<&'a ThrottleProps>,
    pub domain: Option<&'a CustomDomainProps>,
}

/// Logical ids of a synthesized HTTP API.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HttpApiIds {
    pub api_id: String,
    pub stage_id: String,
    pub domain: Option<CustomDomain>,
}

/// Emit an HTTP API whose routes all target one function (payload format 2.0).
pub(crate) fn build_http_api(
    stack: &mut Stack,
    handle: &FunctionHandle,
    spec: HttpApiSpec<'_>,
) -> ConstructResult<HttpApiIds> {
    let construct = spec.construct;
    validate_stage_name(construct, spec.stage_name, true)?;
    if let Some(throttling) = spec.throttling {
        throttling.validate(construct)?;
    }
    let cors = spec.cors.map(|c| c.to_value(construct)).transpose()?;
    if let Some(domain) = spec.domain {
        domain.certificate_arn(stack, construct)?;
    }

    let mut api = json!({ "Name": spec.name, "ProtocolType": "HTTP" });
    if let Some(description) = spec.description {
        api["Description"] = json!(description);
    }
    if let Some(cors) = cors {
        api["CorsConfiguration"] = cors;
    }
    let api_id = stack.add_resource(
        logical_id(&[construct, "Api"]),
        Resource::new("AWS::ApiGatewayV2::Api", api),
    )?;

    let integration_id = stack.add_resource(
        logical_id(&[construct, "Integration"]),
        Resource::new(
            "AWS::ApiGatewayV2::Integration",
            json!({
                "ApiId": reference(&api_id),
                "IntegrationType": "AWS_PROXY",
                "IntegrationUri": handle.arn(),
                "PayloadFormatVersion": "2.0",
            }),
        ),
    )?;

    for route_key in &spec.route_keys {
        let suffix = if route_key == "$default" { "Default" } else { route_key.as_str() };
        stack.add_resource(
            logical_id(&[construct, suffix, "Route"]),
            Resource::new(
                "AWS::ApiGatewayV2::Route",
                json!({
                    "ApiId": reference(&api_id),
                    "RouteKey": route_key,
                    "Target": join("/", vec![json!("integrations"), reference(&integration_id)]),
                }),
            ),
        )?;
    }

    let mut stage = json!({
        "ApiId": reference(&api_id),
        "StageName": spec.stage_name,
        "AutoDeploy": true,
    });
    if let Some(log_arn) = add_access_log_group(stack, construct, spec.access_logs)? {
        stage["AccessLogSettings"] = json!({
            "DestinationArn": log_arn,
            "Format": ACCESS_LOG_FORMAT,
        });
    }
    if let Some(throttling) = spec.throttling {
        stage["DefaultRouteSettings"] = json!({
            "ThrottlingRateLimit": throttling.rate_limit,
            "ThrottlingBurstLimit": throttling.burst_limit,
        });
    }
    let stage_id = stack.add_resource(
        logical_id(&[construct, "Stage"]),
        Resource::new("AWS::ApiGatewayV2::Stage", stage),
    )?;

    add_invoke_permission(stack, construct, handle, &api_id)?;

    let domain = match spec.domain {
        Some(domain) => Some(add_custom_domain(
            stack,
            construct,
            domain,
            GatewayFlavor::V2,
            &api_id,
            &stage_id,
        )?),
        None => None,
    };

    stack.add_exported_output(
        logical_id(&[construct, "ApiId"]),
        reference(&api_id),
        "HTTP API id",
    )?;
    Ok(HttpApiIds {
        api_id,
        stage_id,
        domain,
    })
}

/// Invoke URL of a v2 API stage.
pub(crate) fn stage_url(api_id: &str, stage_name: &str) -> Value {
    if stage_name == "$default" {
        execute_api_url("https", api_id, "/")
    } else {
        execute_api_url("https", api_id, &format!("/{stage_name}/"))
    }
}

/// Props for [`HttpApiConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpApiProps {
    pub id: String,
    pub api_name: Option<String>,
    pub description: Option<String>,
    /// Id of the function handling every request.
    pub handler: Option<String>,
    /// Default: "$default".
    pub stage_name: String,
    pub cors: Option<CorsProps>,
    pub access_logs: AccessLogProps,
    pub throttling: Option<ThrottleProps>,
    pub domain: Option<CustomDomainProps>,
}

impl Default for HttpApiProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            api_name: None,
            description: None,
            handler: None,
            stage_name: default_stage_name(),
            cors: None,
            access_logs: AccessLogProps::default(),
            throttling: None,
            domain: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpApiConstruct {
    pub props: HttpApiProps,
}

impl HttpApiConstruct {
    pub fn new(props: HttpApiProps) -> Self {
        Self { props }
    }
}

impl Construct for HttpApiConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "http_api"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let handler = require(&p.id, "handler", p.handler.as_deref())?;
        let handle = stack.function(&p.id, handler)?;
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
                description: p.description.as_deref(),
                route_keys: vec!["$default".to_string()],
                stage_name: &p.stage_name,
                cors: p.cors.as_ref(),
                access_logs: &p.access_logs,
                throttling: p.throttling.as_ref(),
                domain: p.domain.as_ref(),
            },
        )?;

        stack.add_exported_output(
            logical_id(&[&p.id, "ApiUrl"]),
            stage_url(&ids.api_id, &p.stage_name),
            "HTTP API URL",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::function::tests::stack_with_functions;

    fn props() -> HttpApiProps {
        HttpApiProps {
            id: "public".into(),
            handler: Some("api".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_http_api_defaults() {
        let mut stack = stack_with_functions(&["api"]);
        stack.add(&HttpApiConstruct::new(props())).unwrap();

        let route = stack.resource("PublicDefaultRoute").unwrap();
        assert_eq!(route.get("RouteKey").unwrap(), "$default");
        assert_eq!(
            route.get("Target").unwrap(),
            &json!({ "Fn::Join": ["/", ["integrations", { "Ref": "PublicIntegration" }]] })
        );
        let integration = stack.resource("PublicIntegration").unwrap();
        assert_eq!(integration.get("PayloadFormatVersion").unwrap(), "2.0");

        let stage = stack.resource("PublicStage").unwrap();
        assert_eq!(stage.get("StageName").unwrap(), "$default");
        assert_eq!(stage.get("AutoDeploy").unwrap(), true);

        assert_eq!(
            stack.template().outputs["PublicApiUrl"].value,
            json!({ "Fn::Sub": "https://${PublicApi}.execute-api.${AWS::Region}.${AWS::URLSuffix}/" })
        );
    }

    #[test]
    fn test_cors() {
        let mut stack = stack_with_functions(&["api"]);
        let mut p = props();
        p.cors = Some(CorsProps {
            allow_origins: vec!["https://app.example.com".into()],
            allow_methods: vec!["GET".into(), "POST".into()],
            allow_credentials: true,
            max_age_secs: Some(600),
            ..Default::default()
        });
        stack.add(&HttpApiConstruct::new(p)).unwrap();
        let cors = stack.resource("PublicApi").unwrap().get("CorsConfiguration").unwrap();
        assert_eq!(cors["MaxAge"], 600);
        assert_eq!(cors["AllowMethods"], json!(["GET", "POST"]));

        let mut p = props();
        p.cors = Some(CorsProps {
            allow_origins: vec!["*".into()],
            allow_credentials: true,
            ..Default::default()
        });
        assert!(matches!(
            stack_with_functions(&["api"]).add(&HttpApiConstruct::new(p)),
            Err(ConstructError::Invalid { field: "cors.allow_origins", .. })
        ));
    }

    #[test]
    fn test_named_stage_url() {
        let mut stack = stack_with_functions(&["api"]);
        let mut p = props();
        p.stage_name = "v1".into();
        stack.add(&HttpApiConstruct::new(p)).unwrap();
        assert_eq!(
            stack.template().outputs["PublicApiUrl"].value,
            json!({ "Fn::Sub": "https://${PublicApi}.execute-api.${AWS::Region}.${AWS::URLSuffix}/v1/" })
        );
    }
}
