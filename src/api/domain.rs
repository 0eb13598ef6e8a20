//! Regional custom domains for REST and v2 gateways.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dns::{add_alias_records, normalize_domain, AliasTarget, HostedZone};
use crate::synth::error::{exactly_one, Either};
use crate::synth::intrinsics::{get_att, reference};
use crate::synth::{logical_id, ConstructError, ConstructResult, Resource, Stack};

/// Custom domain props shared by every API construct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CustomDomainProps {
    pub domain_name: String,
    /// Id of a certificate construct in this stack.
    pub certificate: Option<String>,
    pub certificate_arn: Option<String>,
    /// Zone receiving A/AAAA alias records.
    pub hosted_zone: Option<HostedZone>,
    /// Path segment the API is mounted under; root when absent.
    pub base_path: Option<String>,
}

/// Which gateway API family the domain fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayFlavor {
    Rest,
    V2,
}

/// Resolved custom domain.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomDomain {
    pub domain_id: String,
    pub domain_name: String,
    /// Mapping key without surrounding slashes; `None` when mounted at the root.
    pub base_path: Option<String>,
}

impl CustomDomain {
    /// `{scheme}://{domain}[/{base_path}]{path}`.
    pub fn url(&self, scheme: &str, path: &str) -> String {
        match &self.base_path {
            Some(base) => format!("{scheme}://{}/{base}{path}", self.domain_name),
            None => format!("{scheme}://{}{path}", self.domain_name),
        }
    }
}

impl CustomDomainProps {
    /// Validate and resolve the certificate ARN.
    pub(crate) fn certificate_arn(&self, stack: &Stack, construct: &str) -> ConstructResult<Value> {
        if normalize_domain(&self.domain_name).is_empty() {
            return Err(ConstructError::missing(construct, "domain.domain_name"));
        }
        match exactly_one(
            construct,
            ("domain.certificate", self.certificate.as_ref()),
            ("domain.certificate_arn", self.certificate_arn.as_ref()),
        )? {
            Either::First(id) => {
                let cert = stack.certificate(construct, id)?;
                let region = &stack.context().region;
                if &cert.region != region {
                    return Err(ConstructError::dependency(
                        construct,
                        "domain.certificate",
                        format!("a certificate issued in {region}"),
                    ));
                }
                Ok(cert.arn)
            }
            Either::Second(arn) => Ok(json!(arn)),
        }
    }
}

/// Declare the domain, map it to `api_id`/`stage_id`, and add alias records.
pub(crate) fn add_custom_domain(
    stack: &mut Stack,
    construct: &str,
    props: &CustomDomainProps,
    flavor: GatewayFlavor,
    api_id: &str,
    stage_id: &str,
) -> ConstructResult<CustomDomain> {
    let certificate_arn = props.certificate_arn(stack, construct)?;
    let domain_name = normalize_domain(&props.domain_name).to_string();
    if let Some(zone) = &props.hosted_zone {
        zone.validate(construct)?;
        zone.relative_name(construct, &domain_name)?;
    }
    let base_path = props
        .base_path
        .as_deref()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty());

    let domain_id = logical_id(&[construct, "DomainName"]);
    match flavor {
        GatewayFlavor::Rest => {
            stack.add_resource(
                domain_id.clone(),
                Resource::new(
                    "AWS::ApiGateway::DomainName",
                    json!({
                        "DomainName": domain_name,
                        "RegionalCertificateArn": certificate_arn,
                        "EndpointConfiguration": { "Types": ["REGIONAL"] },
                        "SecurityPolicy": "TLS_1_2",
                    }),
                ),
            )?;
            let mut mapping = json!({
                "DomainName": reference(&domain_id),
                "RestApiId": reference(api_id),
                "Stage": reference(stage_id),
            });
            if let Some(path) = base_path {
                mapping["BasePath"] = json!(path);
            }
            stack.add_resource(
                logical_id(&[construct, "BasePathMapping"]),
                Resource::new("AWS::ApiGateway::BasePathMapping", mapping)
                    .depends_on(domain_id.clone())
                    .depends_on(stage_id),
            )?;
        }
        GatewayFlavor::V2 => {
            stack.add_resource(
                domain_id.clone(),
                Resource::new(
                    "AWS::ApiGatewayV2::DomainName",
                    json!({
                        "DomainName": domain_name,
                        "DomainNameConfigurations": [{
                            "CertificateArn": certificate_arn,
                            "EndpointType": "REGIONAL",
                            "SecurityPolicy": "TLS_1_2",
                        }],
                    }),
                ),
            )?;
            let mut mapping = json!({
                "DomainName": reference(&domain_id),
                "ApiId": reference(api_id),
                "Stage": reference(stage_id),
            });
            if let Some(path) = base_path {
                mapping["ApiMappingKey"] = json!(path);
            }
            stack.add_resource(
                logical_id(&[construct, "ApiMapping"]),
                Resource::new("AWS::ApiGatewayV2::ApiMapping", mapping)
                    .depends_on(domain_id.clone())
                    .depends_on(stage_id),
            )?;
        }
    }

    if let Some(zone) = &props.hosted_zone {
        add_alias_records(
            stack,
            construct,
            zone,
            &domain_name,
            &AliasTarget {
                dns_name: get_att(&domain_id, "RegionalDomainName"),
                hosted_zone_id: get_att(&domain_id, "RegionalHostedZoneId"),
            },
            true,
        )?;
    }

    stack.add_exported_output(
        logical_id(&[construct, "CustomDomainName"]),
        json!(domain_name),
        "Custom domain name",
    )?;
    stack.add_exported_output(
        logical_id(&[construct, "RegionalDomainName"]),
        get_att(&domain_id, "RegionalDomainName"),
        "Regional domain name",
    )?;

    Ok(CustomDomain {
        domain_id,
        domain_name,
        base_path: base_path.map(str::to_string),
    })
}
