//! Server-rendered site: SSR function behind a function URL plus a static assets bucket.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cdn::distribution::{synthesize_distribution, BucketOrigin, CustomOrigin, EdgeProps};
use crate::cdn::path_routing::{compile_routing, RewriteMode, SpaOriginConfig};
use crate::compute::function::{add_function_url, FunctionUrlProps, InvokeMode};
use crate::synth::error::require;
use crate::synth::iam::{
    PolicyStatement, DYNAMODB_READ_ACTIONS, DYNAMODB_WRITE_ACTIONS, S3_READ_ACTIONS,
};
use crate::synth::intrinsics::{get_att, reference, sub_with, url_host};
use crate::synth::{logical_id, Construct, ConstructResult, RemovalPolicy, Resource, Stack};

/// Environment key carrying the assets bucket name.
pub const ASSETS_BUCKET_ENV: &str = "APPTHEORY_ASSETS_BUCKET";
/// Environment key carrying the cache table name.
pub const CACHE_TABLE_ENV: &str = "CACHE_TABLE_NAME";

fn default_static_paths() -> Vec<String> {
    vec!["/assets/*".to_string()]
}

/// Props for [`SsrSiteConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SsrSiteProps {
    pub id: String,
    /// Id of the function construct rendering pages.
    pub ssr_function: Option<String>,
    /// Patterns served from the assets bucket (default: `/assets/*`).
    pub static_paths: Vec<String>,
    /// Invoke mode of the function URL when the site has to create one.
    pub invoke_mode: InvokeMode,
    pub assets_bucket_name: Option<String>,
    /// Create a DynamoDB table for rendered-page caching.
    pub cache_table: bool,
    pub removal_policy: RemovalPolicy,
    #[serde(flatten)]
    pub edge: EdgeProps,
}

impl Default for SsrSiteProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            ssr_function: None,
            static_paths: default_static_paths(),
            invoke_mode: InvokeMode::default(),
            assets_bucket_name: None,
            cache_table: false,
            removal_policy: RemovalPolicy::default(),
            edge: EdgeProps::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SsrSiteConstruct {
    pub props: SsrSiteProps,
}

impl SsrSiteConstruct {
    pub fn new(props: SsrSiteProps) -> Self {
        Self { props }
    }
}

impl Construct for SsrSiteConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "ssr_site"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let function_id = require(&p.id, "ssr_function", p.ssr_function.as_deref())?;
        let handle = stack.function(&p.id, function_id)?;
        let edge = p.edge.resolve(stack, &p.id)?;

        let bucket_id = logical_id(&[&p.id, "AssetsBucket"]);
        let spa_origins: Vec<SpaOriginConfig> = p
            .static_paths
            .iter()
            .map(|pattern| SpaOriginConfig {
                bucket_name: bucket_id.clone(),
                path_pattern: pattern.clone(),
                rewrite_mode: RewriteMode::None,
                ..Default::default()
            })
            .collect();
        let plan = compile_routing(&p.id, &[], &spa_origins)?;

        let mut bucket = Resource::new(
            "AWS::S3::Bucket",
            json!({
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true,
                },
                "BucketEncryption": {
                    "ServerSideEncryptionConfiguration": [{
                        "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" }
                    }]
                },
                "OwnershipControls": { "Rules": [{ "ObjectOwnership": "BucketOwnerEnforced" }] },
            }),
        )
        .with_removal_policy(p.removal_policy);
        if let Some(name) = &p.assets_bucket_name {
            bucket.set("BucketName", json!(name));
        }
        stack.add_resource(bucket_id.clone(), bucket)?;

        let url = match handle.url() {
            Some(url) => url,
            None => {
                let url_id = add_function_url(
                    stack,
                    &handle,
                    FunctionUrlProps {
                        invoke_mode: p.invoke_mode,
                        ..Default::default()
                    },
                )?;
                get_att(&url_id, "FunctionUrl")
            }
        };

        let buckets = vec![BucketOrigin {
            key: bucket_id.clone(),
            bucket_name: reference(&bucket_id),
            regional_domain_name: get_att(&bucket_id, "RegionalDomainName"),
        }];
        synthesize_distribution(
            stack,
            &p.id,
            &edge,
            CustomOrigin {
                domain_name: url_host(url),
                origin_path: None,
            },
            &buckets,
            &plan,
        )?;

        handle.bind_environment(stack, ASSETS_BUCKET_ENV, reference(&bucket_id))?;
        handle.grant(
            stack,
            PolicyStatement::allow(
                S3_READ_ACTIONS,
                vec![
                    get_att(&bucket_id, "Arn"),
                    sub_with("${Arn}/*", json!({ "Arn": get_att(&bucket_id, "Arn") })),
                ],
            ),
        )?;

        if p.cache_table {
            if p.removal_policy == RemovalPolicy::Destroy {
                tracing::warn!(construct = %p.id, "Cache table will be deleted with the stack");
            }
            let table_id = stack.add_resource(
                logical_id(&[&p.id, "CacheTable"]),
                Resource::new(
                    "AWS::DynamoDB::Table",
                    json!({
                        "BillingMode": "PAY_PER_REQUEST",
                        "AttributeDefinitions": [{ "AttributeName": "pk", "AttributeType": "S" }],
                        "KeySchema": [{ "AttributeName": "pk", "KeyType": "HASH" }],
                        "TimeToLiveSpecification": { "AttributeName": "ttl", "Enabled": true },
                    }),
                )
                .with_removal_policy(p.removal_policy),
            )?;
            handle.bind_environment(stack, CACHE_TABLE_ENV, reference(&table_id))?;
            handle.grant(
                stack,
                PolicyStatement::allow_all(
                    &[DYNAMODB_READ_ACTIONS, DYNAMODB_WRITE_ACTIONS],
                    vec![get_att(&table_id, "Arn")],
                ),
            )?;
        }

        stack.add_exported_output(
            logical_id(&[&p.id, "AssetsBucketName"]),
            reference(&bucket_id),
            "Static assets bucket",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::function::tests::{function_props, stack_with_functions};
    use crate::compute::FunctionConstruct;
    use crate::synth::ConstructError;

    fn props() -> SsrSiteProps {
        SsrSiteProps {
            id: "web".into(),
            ssr_function: Some("render".into()),
            ..Default::default()
        }
    }

    fn variables(stack: &Stack) -> serde_json::Value {
        stack.resource("RenderFunction").unwrap().get("Environment").unwrap()["Variables"].clone()
    }

    #[test]
    fn test_ssr_site_wiring() {
        let mut stack = stack_with_functions(&["render"]);
        stack.add(&SsrSiteConstruct::new(props())).unwrap();

        let url = stack.resource("RenderUrl").unwrap();
        assert_eq!(url.get("AuthType").unwrap(), "NONE");

        let config = stack
            .resource("WebDistribution")
            .unwrap()
            .get("DistributionConfig")
            .unwrap();
        assert_eq!(
            config["Origins"][0]["DomainName"],
            json!({ "Fn::Select": ["2", { "Fn::Split": ["/", { "Fn::GetAtt": ["RenderUrl", "FunctionUrl"] }] }] })
        );
        assert_eq!(config["CacheBehaviors"][0]["PathPattern"], "/assets/*");
        assert!(config["CacheBehaviors"][0].get("FunctionAssociations").is_none());
        assert_eq!(
            config["Origins"][1]["DomainName"],
            json!({ "Fn::GetAtt": ["WebAssetsBucket", "RegionalDomainName"] })
        );

        assert_eq!(
            variables(&stack)[ASSETS_BUCKET_ENV],
            json!({ "Ref": "WebAssetsBucket" })
        );
        assert!(variables(&stack).get(CACHE_TABLE_ENV).is_none());
        assert_eq!(
            stack.resource("WebAssetsBucket").unwrap().deletion_policy,
            Some(crate::synth::template::DeletionPolicy::Retain)
        );
    }

    #[test]
    fn test_reuses_existing_function_url() {
        let mut stack = stack_with_functions(&[]);
        let mut render = function_props("render");
        render.function_url = Some(FunctionUrlProps::default());
        stack.add(&FunctionConstruct::new(render)).unwrap();
        stack.add(&SsrSiteConstruct::new(props())).unwrap();
        assert_eq!(stack.template().resources_of_type("AWS::Lambda::Url").count(), 1);
    }

    #[test]
    fn test_cache_table() {
        let mut stack = stack_with_functions(&["render"]);
        let mut p = props();
        p.cache_table = true;
        stack.add(&SsrSiteConstruct::new(p)).unwrap();
        assert_eq!(
            variables(&stack)[CACHE_TABLE_ENV],
            json!({ "Ref": "WebCacheTable" })
        );
        let policy = stack.resource("RenderServiceRole").unwrap().get("Policies").unwrap();
        let statements = policy[0]["PolicyDocument"]["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_unknown_function() {
        let mut stack = stack_with_functions(&[]);
        assert!(matches!(
            stack.add(&SsrSiteConstruct::new(props())),
            Err(ConstructError::UnknownReference { kind: "function", .. })
        ));
    }
}
