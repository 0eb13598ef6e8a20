//! REST API construct: one Lambda proxy behind a regional API Gateway.
//!
//! # Data Flow
//! ```text
//! RestApi ── "/" ANY ──────┐
//!        └─ "/{proxy+}" ANY ┴→ AWS_PROXY integration → handler function
//! Deployment → Stage (access logs, throttling) → optional domain / web ACL
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::domain::{add_custom_domain, CustomDomainProps, GatewayFlavor};
use crate::api::integration::{
    add_access_log_group, add_invoke_permission, lambda_integration_uri, validate_stage_name,
    AccessLogProps, ThrottleProps, ACCESS_LOG_FORMAT, STREAMING_TIMEOUT_MILLIS,
};
use crate::compute::FunctionHandle;
use crate::synth::error::require;
use crate::synth::intrinsics::{execute_api_url, get_att, reference, sub};
use crate::synth::{logical_id, Construct, ConstructError, ConstructResult, Resource, Stack};
use crate::waf::{associate_web_acl, WafScope};

fn default_stage_name() -> String {
    "prod".to_string()
}

/// Props for [`RestApiConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RestApiProps {
    pub id: String,
    pub api_name: Option<String>,
    pub description: Option<String>,
    /// Id of the function handling every request.
    pub handler: Option<String>,
    /// Default: "prod".
    pub stage_name: String,
    /// Stream responses through the response-streaming invocation path.
    pub streaming: bool,
    pub access_logs: AccessLogProps,
    pub throttling: Option<ThrottleProps>,
    pub binary_media_types: Vec<String>,
    pub domain: Option<CustomDomainProps>,
    /// Id of a regional web ACL construct.
    pub web_acl: Option<String>,
    pub web_acl_arn: Option<String>,
}

impl Default for RestApiProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            api_name: None,
            description: None,
            handler: None,
            stage_name: default_stage_name(),
            streaming: false,
            access_logs: AccessLogProps::default(),
            throttling: None,
            binary_media_types: Vec::new(),
            domain: None,
            web_acl: None,
            web_acl_arn: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestApiConstruct {
    pub props: RestApiProps,
}

impl RestApiConstruct {
    pub fn new(props: RestApiProps) -> Self {
        Self { props }
    }

    fn integration(&self, handle: &FunctionHandle) -> Value {
        let mut integration = json!({
            "Type": "AWS_PROXY",
            "IntegrationHttpMethod": "POST",
            "Uri": lambda_integration_uri(handle, self.props.streaming),
        });
        if self.props.streaming {
            integration["ResponseTransferMode"] = json!("STREAM");
            integration["TimeoutInMillis"] = json!(STREAMING_TIMEOUT_MILLIS);
        }
        integration
    }

    fn web_acl_arn(&self, stack: &Stack) -> ConstructResult<Option<Value>> {
        let p = &self.props;
        match (&p.web_acl, &p.web_acl_arn) {
            (Some(_), Some(_)) => Err(ConstructError::conflict(&p.id, "web_acl", "web_acl_arn")),
            (Some(id), None) => {
                let acl = stack.web_acl(&p.id, id)?;
                if acl.scope != WafScope::Regional {
                    return Err(ConstructError::invalid(
                        &p.id,
                        "web_acl",
                        format!("`{id}` must use scope = \"regional\""),
                    ));
                }
                Ok(Some(acl.arn))
            }
            (None, Some(arn)) => Ok(Some(json!(arn))),
            (None, None) => Ok(None),
        }
    }
}

impl Construct for RestApiConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "rest_api"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let handler = require(&p.id, "handler", p.handler.as_deref())?;
        let handle = stack.function(&p.id, handler)?;
        validate_stage_name(&p.id, &p.stage_name, false)?;
        if let Some(throttling) = &p.throttling {
            throttling.validate(&p.id)?;
        }
        let web_acl_arn = self.web_acl_arn(stack)?;
        if let Some(domain) = &p.domain {
            domain.certificate_arn(stack, &p.id)?;
        }

        let name = p
            .api_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", stack.context().name, p.id));
        let mut api = json!({
            "Name": name,
            "EndpointConfiguration": { "Types": ["REGIONAL"] },
        });
        if let Some(description) = &p.description {
            api["Description"] = json!(description);
        }
        if !p.binary_media_types.is_empty() {
            api["BinaryMediaTypes"] = json!(p.binary_media_types);
        }
        let api_id = stack.add_resource(
            logical_id(&[&p.id, "Api"]),
            Resource::new("AWS::ApiGateway::RestApi", api),
        )?;

        let proxy_id = stack.add_resource(
            logical_id(&[&p.id, "ProxyResource"]),
            Resource::new(
                "AWS::ApiGateway::Resource",
                json!({
                    "RestApiId": reference(&api_id),
                    "ParentId": get_att(&api_id, "RootResourceId"),
                    "PathPart": "{proxy+}",
                }),
            ),
        )?;

        let mut method_ids = Vec::with_capacity(2);
        for (suffix, resource_id) in [
            ("RootMethod", get_att(&api_id, "RootResourceId")),
            ("ProxyMethod", reference(&proxy_id)),
        ] {
            method_ids.push(stack.add_resource(
                logical_id(&[&p.id, suffix]),
                Resource::new(
                    "AWS::ApiGateway::Method",
                    json!({
                        "RestApiId": reference(&api_id),
                        "ResourceId": resource_id,
                        "HttpMethod": "ANY",
                        "AuthorizationType": "NONE",
                        "Integration": self.integration(&handle),
                    }),
                ),
            )?);
        }

        let mut deployment = Resource::new(
            "AWS::ApiGateway::Deployment",
            json!({ "RestApiId": reference(&api_id) }),
        );
        for method_id in &method_ids {
            deployment = deployment.depends_on(method_id.clone());
        }
        let deployment_id = stack.add_resource(logical_id(&[&p.id, "Deployment"]), deployment)?;

        let mut stage = json!({
            "RestApiId": reference(&api_id),
            "DeploymentId": reference(&deployment_id),
            "StageName": p.stage_name,
        });
        if let Some(log_arn) = add_access_log_group(stack, &p.id, &p.access_logs)? {
            stage["AccessLogSetting"] = json!({
                "DestinationArn": log_arn,
                "Format": ACCESS_LOG_FORMAT,
            });
        }
        if let Some(throttling) = &p.throttling {
            stage["MethodSettings"] = json!([{
                "ResourcePath": "/*",
                "HttpMethod": "*",
                "ThrottlingRateLimit": throttling.rate_limit,
                "ThrottlingBurstLimit": throttling.burst_limit,
            }]);
        }
        let stage_id = stack.add_resource(
            logical_id(&[&p.id, "Stage"]),
            Resource::new("AWS::ApiGateway::Stage", stage),
        )?;

        add_invoke_permission(stack, &p.id, &handle, &api_id)?;

        if let Some(acl_arn) = web_acl_arn {
            let stage_arn = sub(format!(
                "arn:${{AWS::Partition}}:apigateway:${{AWS::Region}}::/restapis/${{{api_id}}}/stages/{}",
                p.stage_name
            ));
            associate_web_acl(
                stack,
                &logical_id(&[&p.id, "WebAclAssociation"]),
                acl_arn,
                stage_arn,
                Some(&stage_id),
            )?;
        }

        if let Some(domain) = &p.domain {
            add_custom_domain(stack, &p.id, domain, GatewayFlavor::Rest, &api_id, &stage_id)?;
        }

        stack.add_exported_output(
            logical_id(&[&p.id, "ApiId"]),
            reference(&api_id),
            "REST API id",
        )?;
        stack.add_exported_output(
            logical_id(&[&p.id, "ApiUrl"]),
            execute_api_url("https", &api_id, &format!("/{}/", p.stage_name)),
            "REST API URL",
        )
    }
}
