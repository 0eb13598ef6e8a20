//! DNS record construct.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::dns::zone::HostedZone;
use crate::synth::{logical_id, Construct, ConstructError, ConstructResult, Resource, Stack};

/// Hosted zone id of every CloudFront distribution alias target.
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// What the record points at.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordTarget {
    /// A (and optionally AAAA) alias to another AWS endpoint.
    Alias {
        dns_name: String,
        hosted_zone_id: String,
        #[serde(default = "default_true")]
        ipv6: bool,
    },
    Cname {
        target: String,
    },
    Txt {
        values: Vec<String>,
    },
}

fn default_true() -> bool {
    true
}

/// Props for [`DnsRecordConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DnsRecordProps {
    pub id: String,
    pub hosted_zone: Option<HostedZone>,
    /// Fully-qualified record name.
    pub domain_name: String,
    pub target: RecordTarget,
    /// TTL in seconds for non-alias records (default: 300).
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

fn default_ttl() -> u32 {
    300
}

/// A single record set in an existing hosted zone.
#[derive(Debug, Clone)]
pub struct DnsRecordConstruct {
    pub props: DnsRecordProps,
}

impl DnsRecordConstruct {
    pub fn new(props: DnsRecordProps) -> Self {
        Self { props }
    }
}

impl Construct for DnsRecordConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "dns_record"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let zone = p
            .hosted_zone
            .as_ref()
            .ok_or_else(|| ConstructError::missing(&p.id, "hosted_zone"))?;
        zone.validate(&p.id)?;
        if p.domain_name.trim().is_empty() {
            return Err(ConstructError::missing(&p.id, "domain_name"));
        }

        match &p.target {
            RecordTarget::Alias {
                dns_name,
                hosted_zone_id,
                ipv6,
            } => {
                if dns_name.trim().is_empty() {
                    return Err(ConstructError::missing(&p.id, "target.dns_name"));
                }
                if hosted_zone_id.trim().is_empty() {
                    return Err(ConstructError::missing(&p.id, "target.hosted_zone_id"));
                }
                add_alias_records(
                    stack,
                    &p.id,
                    zone,
                    &p.domain_name,
                    &AliasTarget {
                        dns_name: json!(dns_name),
                        hosted_zone_id: json!(hosted_zone_id),
                    },
                    *ipv6,
                )?;
            }
            RecordTarget::Cname { target } => {
                if target.trim().is_empty() {
                    return Err(ConstructError::missing(&p.id, "target.target"));
                }
                if zone.relative_name(&p.id, &p.domain_name)?.is_empty() {
                    return Err(ConstructError::invalid(
                        &p.id,
                        "domain_name",
                        "a CNAME cannot be created at the zone apex",
                    ));
                }
                let name = zone.record_set_name(&p.id, &p.domain_name)?;
                let records = json!({ "TTL": p.ttl.to_string(), "ResourceRecords": [target] });
                stack.add_resource(
                    logical_id(&[&p.id, "Record"]),
                    record_set(zone, name, "CNAME", records),
                )?;
            }
            RecordTarget::Txt { values } => {
                if values.is_empty() {
                    return Err(ConstructError::missing(&p.id, "target.values"));
                }
                if let Some(long) = values.iter().find(|v| v.len() > 255) {
                    return Err(ConstructError::invalid(
                        &p.id,
                        "target.values",
                        format!("TXT value of {} characters exceeds 255", long.len()),
                    ));
                }
                let name = zone.record_set_name(&p.id, &p.domain_name)?;
                let quoted: Vec<String> = values.iter().map(|v| quote_txt(v)).collect();
                let records = json!({ "TTL": p.ttl.to_string(), "ResourceRecords": quoted });
                stack.add_resource(
                    logical_id(&[&p.id, "Record"]),
                    record_set(zone, name, "TXT", records),
                )?;
            }
        }
        Ok(())
    }
}

/// Quote a TXT character string, escaping backslashes and quotes.
fn quote_txt(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Alias target of an A/AAAA record.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasTarget {
    pub dns_name: Value,
    pub hosted_zone_id: Value,
}

impl AliasTarget {
    /// Alias to a CloudFront distribution.
    pub fn cloudfront(domain_name: Value) -> Self {
        Self {
            dns_name: domain_name,
            hosted_zone_id: json!(CLOUDFRONT_HOSTED_ZONE_ID),
        }
    }
}

/// Add an A alias record (and an AAAA twin when `ipv6`) for `domain_name`.
///
/// Returns the logical ids of the created records.
pub fn add_alias_records(
    stack: &mut Stack,
    construct: &str,
    zone: &HostedZone,
    domain_name: &str,
    target: &AliasTarget,
    ipv6: bool,
) -> ConstructResult<Vec<String>> {
    let name = zone.record_set_name(construct, domain_name)?;
    let alias = json!({
        "AliasTarget": {
            "DNSName": target.dns_name,
            "HostedZoneId": target.hosted_zone_id,
            "EvaluateTargetHealth": false,
        }
    });

    let mut ids = vec![stack.add_resource(
        logical_id(&[construct, "AliasRecord"]),
        record_set(zone, name.clone(), "A", alias.clone()),
    )?];
    if ipv6 {
        ids.push(stack.add_resource(
            logical_id(&[construct, "AliasRecordIpv6"]),
            record_set(zone, name, "AAAA", alias),
        )?);
    }
    Ok(ids)
}

fn record_set(zone: &HostedZone, name: String, record_type: &str, extra: Value) -> Resource {
    let mut resource = Resource::new(
        "AWS::Route53::RecordSet",
        json!({
            "HostedZoneId": zone.hosted_zone_id,
            "Name": name,
            "Type": record_type,
        }),
    );
    if let Value::Object(map) = extra {
        for (key, value) in map {
            resource.set(&key, value);
        }
    }
    resource
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::StackContext;

    fn props(domain: &str, target: RecordTarget) -> DnsRecordProps {
        DnsRecordProps {
            id: "www".into(),
            hosted_zone: Some(HostedZone::new("Z123", "example.com")),
            domain_name: domain.into(),
            target,
            ttl: 300,
        }
    }

    #[test]
    fn test_alias_records() {
        let mut stack = Stack::new(StackContext::default());
        let target = RecordTarget::Alias {
            dns_name: "d111.cloudfront.net".into(),
            hosted_zone_id: CLOUDFRONT_HOSTED_ZONE_ID.into(),
            ipv6: true,
        };
        stack
            .add(&DnsRecordConstruct::new(props("www.example.com", target)))
            .unwrap();
        let resources = &stack.template().resources;
        assert_eq!(resources["WwwAliasRecord"].get("Type").unwrap(), "A");
        assert_eq!(resources["WwwAliasRecordIpv6"].get("Type").unwrap(), "AAAA");
        assert_eq!(
            resources["WwwAliasRecord"].get("Name").unwrap(),
            "www.example.com."
        );
    }

    #[test]
    fn test_cname_at_apex_rejected() {
        let mut stack = Stack::new(StackContext::default());
        let target = RecordTarget::Cname {
            target: "elsewhere.net".into(),
        };
        let err = stack
            .add(&DnsRecordConstruct::new(props("example.com", target)))
            .unwrap_err();
        assert!(err.to_string().contains("zone apex"));
    }

    #[test]
    fn test_name_outside_zone_rejected() {
        let mut stack = Stack::new(StackContext::default());
        let target = RecordTarget::Txt {
            values: vec!["v=spf1 -all".into()],
        };
        let err = stack
            .add(&DnsRecordConstruct::new(props("mail.other.org", target)))
            .unwrap_err();
        assert!(matches!(err, ConstructError::Invalid { field: "domain_name", .. }));
    }

    #[test]
    fn test_txt_values_quoted() {
        let mut stack = Stack::new(StackContext::default());
        let target = RecordTarget::Txt {
            values: vec!["v=spf1 -all".into()],
        };
        stack
            .add(&DnsRecordConstruct::new(props("example.com", target)))
            .unwrap();
        let record = &stack.template().resources["WwwRecord"];
        assert_eq!(
            record.get("ResourceRecords").unwrap(),
            &json!(["\"v=spf1 -all\""])
        );
        assert_eq!(record.get("TTL").unwrap(), "300");
    }

    #[test]
    fn test_txt_values_escape_quotes() {
        let mut stack = Stack::new(StackContext::default());
        let target = RecordTarget::Txt {
            values: vec![r#"say "hi""#.into(), r"a\b".into()],
        };
        stack
            .add(&DnsRecordConstruct::new(props("example.com", target)))
            .unwrap();
        let record = &stack.template().resources["WwwRecord"];
        assert_eq!(
            record.get("ResourceRecords").unwrap(),
            &json!([r#""say \"hi\"""#, r#""a\\b""#])
        );
    }

    #[test]
    fn test_missing_zone() {
        let mut stack = Stack::new(StackContext::default());
        let mut p = props("www.example.com", RecordTarget::Cname { target: "x.net".into() });
        p.hosted_zone = None;
        assert_eq!(
            stack.add(&DnsRecordConstruct::new(p)).unwrap_err(),
            ConstructError::missing("www", "hosted_zone")
        );
    }
}
