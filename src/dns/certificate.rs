//! ACM certificate construct.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::dns::record_name::normalize_domain;
use crate::dns::zone::HostedZone;
use crate::synth::intrinsics::reference;
use crate::synth::{
    logical_id, CertificateRef, Construct, ConstructError, ConstructResult, Resource, Stack,
};

/// How ownership of the names is proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    #[default]
    Dns,
    Email,
}

/// Props for [`CertificateConstruct`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CertificateProps {
    pub id: String,
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    /// Zone receiving the validation records (DNS validation only).
    pub hosted_zone: Option<HostedZone>,
    pub validation: ValidationMethod,
}

#[derive(Debug, Clone)]
pub struct CertificateConstruct {
    pub props: CertificateProps,
}

impl CertificateConstruct {
    pub fn new(props: CertificateProps) -> Self {
        Self { props }
    }
}

impl Construct for CertificateConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "certificate"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let domain = normalize_domain(&p.domain_name);
        if domain.is_empty() {
            return Err(ConstructError::missing(&p.id, "domain_name"));
        }

        let mut names: Vec<&str> = vec![domain];
        for san in &p.subject_alternative_names {
            let san = normalize_domain(san);
            if san.is_empty() {
                return Err(ConstructError::invalid(
                    &p.id,
                    "subject_alternative_names",
                    "contains an empty name",
                ));
            }
            if !names.contains(&san) {
                names.push(san);
            }
        }

        let mut properties = json!({
            "DomainName": domain,
            "ValidationMethod": match p.validation {
                ValidationMethod::Dns => "DNS",
                ValidationMethod::Email => "EMAIL",
            },
        });
        if names.len() > 1 {
            properties["SubjectAlternativeNames"] = json!(names[1..]);
        }

        if let Some(zone) = &p.hosted_zone {
            if p.validation != ValidationMethod::Dns {
                return Err(ConstructError::dependency(
                    &p.id,
                    "hosted_zone",
                    "validation = \"dns\"",
                ));
            }
            zone.validate(&p.id)?;
            let mut options = Vec::with_capacity(names.len());
            for name in &names {
                // Wildcards validate against their base name.
                let base = name.strip_prefix("*.").unwrap_or(name);
                zone.relative_name(&p.id, base)?;
                options.push(json!({ "DomainName": name, "HostedZoneId": zone.hosted_zone_id }));
            }
            properties["DomainValidationOptions"] = json!(options);
        }

        let cert_id = stack.add_resource(
            logical_id(&[&p.id, "Certificate"]),
            Resource::new("AWS::CertificateManager::Certificate", properties),
        )?;

        stack.add_exported_output(
            logical_id(&[&p.id, "CertificateArn"]),
            reference(&cert_id),
            "Certificate ARN",
        )?;
        let region = stack.context().region.clone();
        stack.register_certificate(
            &p.id,
            CertificateRef {
                arn: reference(&cert_id),
                region,
            },
        )
    }
}
