//! CloudFront distribution construct and the edge wiring shared with the SSR site.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::cdn::edge_function::{render_rewrite_function, FUNCTION_RUNTIME};
use crate::cdn::origin::parse_origin;
use crate::cdn::path_routing::{compile_routing, BehaviorTarget, RoutingPlan, SpaOriginConfig};
use crate::dns::{add_alias_records, normalize_domain, AliasTarget, HostedZone};
use crate::synth::error::{exactly_one, require, Either};
use crate::synth::intrinsics::{get_att, reference, sub, sub_with};
use crate::synth::{logical_id, Construct, ConstructError, ConstructResult, Resource, Stack};
use crate::waf::WafScope;

/// Managed cache policy: CachingDisabled.
pub const CACHING_DISABLED_POLICY: &str = "4135ea2d-6df8-44a3-9df3-4b5a84be39ad";
/// Managed cache policy: CachingOptimized.
pub const CACHING_OPTIMIZED_POLICY: &str = "658327ea-f89d-4fab-a63d-7e88639e58f6";
/// Managed origin request policy: AllViewerExceptHostHeader.
pub const ALL_VIEWER_EXCEPT_HOST_HEADER_POLICY: &str = "b689b0a8-53d0-40ab-baf2-68738e2966ac";

const ALL_METHODS: [&str; 7] = ["GET", "HEAD", "OPTIONS", "PUT", "PATCH", "POST", "DELETE"];
const READ_METHODS: [&str; 3] = ["GET", "HEAD", "OPTIONS"];
const CACHED_METHODS: [&str; 2] = ["GET", "HEAD"];
const PRICE_CLASSES: [&str; 3] = ["PriceClass_100", "PriceClass_200", "PriceClass_All"];
const BACKEND_ORIGIN_ID: &str = "Backend";
const MAX_NAME_LEN: usize = 64;

fn default_price_class() -> String {
    "PriceClass_100".to_string()
}

/// Domain, certificate, firewall and pricing options of a distribution.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EdgeProps {
    /// Custom domain served by the distribution.
    pub domain_name: Option<String>,
    /// Zone for A/AAAA alias records of `domain_name`.
    pub hosted_zone: Option<HostedZone>,
    /// Id of a certificate construct in this stack.
    pub certificate: Option<String>,
    pub certificate_arn: Option<String>,
    /// Id of a web ACL construct with cloudfront scope.
    pub web_acl: Option<String>,
    pub web_acl_arn: Option<String>,
    pub price_class: String,
    pub comment: Option<String>,
}

impl Default for EdgeProps {
    fn default() -> Self {
        Self {
            domain_name: None,
            hosted_zone: None,
            certificate: None,
            certificate_arn: None,
            web_acl: None,
            web_acl_arn: None,
            price_class: default_price_class(),
            comment: None,
        }
    }
}

/// Edge options after references are resolved.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedEdge {
    pub domain_name: Option<String>,
    pub certificate_arn: Option<Value>,
    pub hosted_zone: Option<HostedZone>,
    pub web_acl_arn: Option<Value>,
    pub price_class: String,
    pub comment: Option<String>,
}

impl EdgeProps {
    pub(crate) fn resolve(&self, stack: &Stack, construct: &str) -> ConstructResult<ResolvedEdge> {
        let domain = self
            .domain_name
            .as_deref()
            .map(normalize_domain)
            .filter(|d| !d.is_empty());

        let certificate_arn = match domain {
            Some(_) => match exactly_one(
                construct,
                ("certificate", self.certificate.as_ref()),
                ("certificate_arn", self.certificate_arn.as_ref()),
            )? {
                Either::First(id) => {
                    let cert = stack.certificate(construct, id)?;
                    if cert.region != "us-east-1" {
                        return Err(ConstructError::dependency(
                            construct,
                            "certificate",
                            "a certificate issued in us-east-1",
                        ));
                    }
                    Some(cert.arn)
                }
                Either::Second(arn) => Some(json!(arn)),
            },
            None => {
                if self.certificate.is_some() || self.certificate_arn.is_some() {
                    return Err(ConstructError::dependency(construct, "certificate", "domain_name"));
                }
                if self.hosted_zone.is_some() {
                    return Err(ConstructError::dependency(construct, "hosted_zone", "domain_name"));
                }
                None
            }
        };

        if let (Some(zone), Some(domain)) = (&self.hosted_zone, domain) {
            zone.validate(construct)?;
            zone.relative_name(construct, domain)?;
        }

        let web_acl_arn = match (&self.web_acl, &self.web_acl_arn) {
            (Some(_), Some(_)) => {
                return Err(ConstructError::conflict(construct, "web_acl", "web_acl_arn"));
            }
            (Some(id), None) => {
                let acl = stack.web_acl(construct, id)?;
                if acl.scope != WafScope::Cloudfront {
                    return Err(ConstructError::invalid(
                        construct,
                        "web_acl",
                        format!("`{id}` must use scope = \"cloudfront\""),
                    ));
                }
                Some(acl.arn)
            }
            (None, Some(arn)) => {
                Some(json!(require(construct, "web_acl_arn", Some(arn.as_str()))?))
            }
            (None, None) => None,
        };

        if !PRICE_CLASSES.contains(&self.price_class.as_str()) {
            return Err(ConstructError::invalid(
                construct,
                "price_class",
                format!("expected one of {}", PRICE_CLASSES.join(", ")),
            ));
        }

        Ok(ResolvedEdge {
            domain_name: domain.map(str::to_string),
            certificate_arn,
            hosted_zone: self.hosted_zone.clone(),
            web_acl_arn,
            price_class: self.price_class.clone(),
            comment: self.comment.clone(),
        })
    }
}

/// The uncached default origin.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CustomOrigin {
    pub domain_name: Value,
    pub origin_path: Option<String>,
}

/// A bucket served through origin access control.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BucketOrigin {
    /// Key used by [`SpaOriginConfig::bucket_name`] to select this bucket.
    pub key: String,
    pub bucket_name: Value,
    pub regional_domain_name: Value,
}

impl BucketOrigin {
    /// An existing bucket referenced by name.
    pub fn existing(stack: &Stack, name: &str) -> Self {
        let ctx = stack.context();
        Self {
            key: name.to_string(),
            bucket_name: json!(name),
            regional_domain_name: json!(format!("{name}.s3.{}.{}", ctx.region, ctx.url_suffix())),
        }
    }

    fn origin_id(&self) -> String {
        logical_id(&["Bucket", &self.key])
    }
}

fn resource_name(stack: &Stack, construct: &str, suffix: &str) -> String {
    let mut name = logical_id(&[&stack.context().name, construct, suffix]);
    name.truncate(MAX_NAME_LEN);
    name
}

fn bypass_behavior(origin_id: &str) -> Value {
    json!({
        "TargetOriginId": origin_id,
        "ViewerProtocolPolicy": "redirect-to-https",
        "CachePolicyId": CACHING_DISABLED_POLICY,
        "OriginRequestPolicyId": ALL_VIEWER_EXCEPT_HOST_HEADER_POLICY,
        "AllowedMethods": ALL_METHODS,
        "CachedMethods": CACHED_METHODS,
        "Compress": true,
    })
}

fn bucket_behavior(origin_id: &str, function_arn: Option<&Value>) -> Value {
    let mut behavior = json!({
        "TargetOriginId": origin_id,
        "ViewerProtocolPolicy": "redirect-to-https",
        "CachePolicyId": CACHING_OPTIMIZED_POLICY,
        "AllowedMethods": READ_METHODS,
        "CachedMethods": CACHED_METHODS,
        "Compress": true,
    });
    if let Some(arn) = function_arn {
        behavior["FunctionAssociations"] = json!([{
            "EventType": "viewer-request",
            "FunctionARN": arn,
        }]);
    }
    behavior
}

/// Emit the distribution and everything hanging off it.
///
/// Returns the distribution's logical id.
pub(crate) fn synthesize_distribution(
    stack: &mut Stack,
    construct: &str,
    edge: &ResolvedEdge,
    backend: CustomOrigin,
    buckets: &[BucketOrigin],
    plan: &RoutingPlan,
) -> ConstructResult<String> {
    let function_arn = match &plan.rewrite_table {
        Some(table) => {
            let code = render_rewrite_function(construct, table)?;
            let name = resource_name(stack, construct, "Rewrite");
            let function_id = stack.add_resource(
                logical_id(&[construct, "RewriteFunction"]),
                Resource::new(
                    "AWS::CloudFront::Function",
                    json!({
                        "Name": name,
                        "AutoPublish": true,
                        "FunctionCode": code,
                        "FunctionConfig": {
                            "Comment": format!("SPA path rewrites for {construct}"),
                            "Runtime": FUNCTION_RUNTIME,
                        },
                    }),
                ),
            )?;
            tracing::debug!(
                construct = %construct,
                routes = table.entries().len(),
                "Edge rewrite function generated"
            );
            Some(get_att(&function_id, "FunctionMetadata.FunctionARN"))
        }
        None => None,
    };

    let mut origins = Vec::with_capacity(buckets.len() + 1);
    let mut backend_origin = json!({
        "Id": BACKEND_ORIGIN_ID,
        "DomainName": backend.domain_name,
        "CustomOriginConfig": {
            "OriginProtocolPolicy": "https-only",
            "OriginSSLProtocols": ["TLSv1.2"],
            "HTTPSPort": 443,
        },
    });
    if let Some(path) = &backend.origin_path {
        backend_origin["OriginPath"] = json!(path);
    }
    origins.push(backend_origin);

    if !buckets.is_empty() {
        let name = resource_name(stack, construct, "Oac");
        let oac_id = stack.add_resource(
            logical_id(&[construct, "OriginAccessControl"]),
            Resource::new(
                "AWS::CloudFront::OriginAccessControl",
                json!({
                    "OriginAccessControlConfig": {
                        "Name": name,
                        "OriginAccessControlOriginType": "s3",
                        "SigningBehavior": "always",
                        "SigningProtocol": "sigv4",
                    }
                }),
            ),
        )?;
        for bucket in buckets {
            origins.push(json!({
                "Id": bucket.origin_id(),
                "DomainName": bucket.regional_domain_name,
                "OriginAccessControlId": get_att(&oac_id, "Id"),
                "S3OriginConfig": { "OriginAccessIdentity": "" },
            }));
        }
    }

    let mut cache_behaviors = Vec::with_capacity(plan.behaviors.len());
    for behavior in &plan.behaviors {
        let mut value = match &behavior.target {
            BehaviorTarget::Backend => bypass_behavior(BACKEND_ORIGIN_ID),
            BehaviorTarget::Bucket {
                bucket_name,
                rewrite,
            } => {
                let bucket = buckets
                    .iter()
                    .find(|b| &b.key == bucket_name)
                    .ok_or_else(|| ConstructError::UnknownReference {
                        construct: construct.to_string(),
                        kind: "bucket",
                        id: bucket_name.clone(),
                    })?;
                let association = if *rewrite { function_arn.as_ref() } else { None };
                bucket_behavior(&bucket.origin_id(), association)
            }
        };
        value["PathPattern"] = json!(behavior.path_pattern);
        cache_behaviors.push(value);
    }

    let mut config = json!({
        "Enabled": true,
        "HttpVersion": "http2and3",
        "IPV6Enabled": true,
        "PriceClass": edge.price_class,
        "Origins": origins,
        "DefaultCacheBehavior": bypass_behavior(BACKEND_ORIGIN_ID),
    });
    if !cache_behaviors.is_empty() {
        config["CacheBehaviors"] = json!(cache_behaviors);
    }
    if let Some(comment) = &edge.comment {
        config["Comment"] = json!(comment);
    }
    if let (Some(domain), Some(cert)) = (&edge.domain_name, &edge.certificate_arn) {
        config["Aliases"] = json!([domain]);
        config["ViewerCertificate"] = json!({
            "AcmCertificateArn": cert,
            "SslSupportMethod": "sni-only",
            "MinimumProtocolVersion": "TLSv1.2_2021",
        });
    }
    if let Some(acl) = &edge.web_acl_arn {
        config["WebACLId"] = acl.clone();
    }

    let dist_id = stack.add_resource(
        logical_id(&[construct, "Distribution"]),
        Resource::new(
            "AWS::CloudFront::Distribution",
            json!({ "DistributionConfig": config }),
        ),
    )?;

    let source_arn = sub(format!(
        "arn:${{AWS::Partition}}:cloudfront::${{AWS::AccountId}}:distribution/${{{dist_id}}}"
    ));
    for bucket in buckets {
        stack.add_resource(
            logical_id(&[construct, &bucket.key, "BucketPolicy"]),
            Resource::new(
                "AWS::S3::BucketPolicy",
                json!({
                    "Bucket": bucket.bucket_name,
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": "cloudfront.amazonaws.com" },
                            "Action": "s3:GetObject",
                            "Resource": sub_with(
                                "arn:${AWS::Partition}:s3:::${Bucket}/*",
                                json!({ "Bucket": bucket.bucket_name }),
                            ),
                            "Condition": { "StringEquals": { "AWS:SourceArn": source_arn } },
                        }],
                    },
                }),
            ),
        )?;
    }

    if let (Some(zone), Some(domain)) = (&edge.hosted_zone, &edge.domain_name) {
        add_alias_records(
            stack,
            construct,
            zone,
            domain,
            &AliasTarget::cloudfront(get_att(&dist_id, "DomainName")),
            true,
        )?;
    }

    stack.add_exported_output(
        logical_id(&[construct, "DistributionId"]),
        reference(&dist_id),
        "Distribution id",
    )?;
    stack.add_exported_output(
        logical_id(&[construct, "DistributionDomainName"]),
        get_att(&dist_id, "DomainName"),
        "Distribution domain name",
    )?;
    if let Some(domain) = &edge.domain_name {
        stack.add_exported_output(
            logical_id(&[construct, "CustomDomainName"]),
            json!(domain),
            "Custom domain name",
        )?;
    }
    Ok(dist_id)
}

/// Props for [`DistributionConstruct`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DistributionProps {
    pub id: String,
    /// Primary backend; serves the default behavior and bypass paths.
    pub backend_url: Option<String>,
    pub spa_origins: Vec<SpaOriginConfig>,
    /// Patterns always sent to the backend uncached.
    pub bypass_paths: Vec<String>,
    #[serde(flatten)]
    pub edge: EdgeProps,
}

/// Multi-origin distribution: an API backend plus static SPA buckets.
#[derive(Debug, Clone)]
pub struct DistributionConstruct {
    pub props: DistributionProps,
}

impl DistributionConstruct {
    pub fn new(props: DistributionProps) -> Self {
        Self { props }
    }
}

impl Construct for DistributionConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "distribution"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let backend_url = require(&p.id, "backend_url", p.backend_url.as_deref())?;
        let origin = parse_origin(backend_url)?;
        let plan = compile_routing(&p.id, &p.bypass_paths, &p.spa_origins)?;
        let edge = p.edge.resolve(stack, &p.id)?;

        let mut buckets: Vec<BucketOrigin> = Vec::new();
        for spa in &p.spa_origins {
            if buckets.iter().any(|b| b.key == spa.bucket_name) {
                continue;
            }
            let bucket = BucketOrigin::existing(stack, &spa.bucket_name);
            if let Some(other) = buckets.iter().find(|b| b.origin_id() == bucket.origin_id()) {
                return Err(ConstructError::invalid(
                    &p.id,
                    "spa_origins.bucket_name",
                    format!(
                        "buckets `{}` and `{}` would share the origin id {}",
                        other.key,
                        bucket.key,
                        bucket.origin_id()
                    ),
                ));
            }
            buckets.push(bucket);
        }

        synthesize_distribution(
            stack,
            &p.id,
            &edge,
            CustomOrigin {
                domain_name: json!(origin.domain_name),
                origin_path: origin.origin_path,
            },
            &buckets,
            &plan,
        )?;
        Ok(())
    }
}
