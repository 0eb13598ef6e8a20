//! Security group construct.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::network::cidr::Cidr;
use crate::synth::error::{exactly_one, require, Either};
use crate::synth::intrinsics::get_att;
use crate::synth::{logical_id, Construct, ConstructError, ConstructResult, Resource, Stack};

/// IP protocol of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Icmp,
    All,
}

impl Protocol {
    fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::All => "-1",
        }
    }
}

/// One inbound rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub from_port: Option<u32>,
    /// Defaults to `from_port`.
    pub to_port: Option<u32>,
    pub cidr: Option<String>,
    pub source_security_group_id: Option<String>,
    pub description: Option<String>,
}

/// Props for [`SecurityGroupConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityGroupProps {
    pub id: String,
    pub vpc_id: Option<String>,
    pub description: Option<String>,
    pub ingress: Vec<IngressRule>,
    /// Allow all outbound traffic (default: true).
    pub allow_all_outbound: bool,
}

impl Default for SecurityGroupProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            vpc_id: None,
            description: None,
            ingress: Vec::new(),
            allow_all_outbound: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityGroupConstruct {
    pub props: SecurityGroupProps,
}

impl SecurityGroupConstruct {
    pub fn new(props: SecurityGroupProps) -> Self {
        Self { props }
    }
}

fn ingress_value(construct: &str, index: usize, rule: &IngressRule) -> ConstructResult<Value> {
    let mut value = json!({ "IpProtocol": rule.protocol.as_str() });

    match rule.protocol {
        Protocol::Tcp | Protocol::Udp => {
            let from = rule
                .from_port
                .ok_or_else(|| ConstructError::missing(construct, "ingress.from_port"))?;
            let to = rule.to_port.unwrap_or(from);
            if from > to || to > 65_535 {
                return Err(ConstructError::invalid(
                    construct,
                    "ingress",
                    format!("rule {index} has invalid port range {from}-{to}"),
                ));
            }
            value["FromPort"] = json!(from);
            value["ToPort"] = json!(to);
        }
        Protocol::Icmp => {
            // ICMP type/code; -1 means all.
            value["FromPort"] = json!(rule.from_port.map(i64::from).unwrap_or(-1));
            value["ToPort"] = json!(rule.to_port.map(i64::from).unwrap_or(-1));
        }
        Protocol::All => {
            if rule.from_port.is_some() || rule.to_port.is_some() {
                return Err(ConstructError::invalid(
                    construct,
                    "ingress",
                    format!("rule {index} sets ports on an all-protocol rule"),
                ));
            }
        }
    }

    match exactly_one(
        construct,
        ("ingress.cidr", rule.cidr.as_ref()),
        ("ingress.source_security_group_id", rule.source_security_group_id.as_ref()),
    )? {
        Either::First(cidr) => {
            let cidr = Cidr::parse(cidr)
                .map_err(|reason| ConstructError::invalid(construct, "ingress.cidr", reason))?;
            let key = if cidr.is_ipv4() { "CidrIp" } else { "CidrIpv6" };
            value[key] = json!(cidr.to_string());
        }
        Either::Second(group) => {
            value["SourceSecurityGroupId"] = json!(group);
        }
    }

    if let Some(description) = &rule.description {
        value["Description"] = json!(description);
    }
    Ok(value)
}

impl Construct for SecurityGroupConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "security_group"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        let vpc_id = require(&p.id, "vpc_id", p.vpc_id.as_deref())?;

        let ingress = p
            .ingress
            .iter()
            .enumerate()
            .map(|(i, rule)| ingress_value(&p.id, i, rule))
            .collect::<ConstructResult<Vec<_>>>()?;

        let description = p
            .description
            .clone()
            .unwrap_or_else(|| format!("Security group for {}", p.id));

        let mut properties = json!({
            "GroupDescription": description,
            "VpcId": vpc_id,
            "SecurityGroupIngress": ingress,
        });
        if !p.allow_all_outbound {
            // Placeholder rule that matches no traffic; removes the implicit allow-all egress.
            properties["SecurityGroupEgress"] = json!([{
                "CidrIp": "255.255.255.255/32",
                "Description": "Disallow all traffic",
                "FromPort": 252,
                "IpProtocol": "icmp",
                "ToPort": 86,
            }]);
        }

        let sg_id = stack.add_resource(
            logical_id(&[&p.id, "SecurityGroup"]),
            Resource::new("AWS::EC2::SecurityGroup", properties),
        )?;
        stack.add_exported_output(
            logical_id(&[&p.id, "SecurityGroupId"]),
            get_att(&sg_id, "GroupId"),
            "Security group id",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::StackContext;

    fn props(ingress: Vec<IngressRule>) -> SecurityGroupProps {
        SecurityGroupProps {
            id: "db".into(),
            vpc_id: Some("vpc-123".into()),
            ingress,
            ..Default::default()
        }
    }

    #[test]
    fn test_ingress_rules() {
        let mut stack = Stack::new(StackContext::default());
        let rules = vec![
            IngressRule {
                from_port: Some(5432),
                cidr: Some("10.0.0.0/16".into()),
                ..Default::default()
            },
            IngressRule {
                protocol: Protocol::Tcp,
                from_port: Some(443),
                source_security_group_id: Some("sg-abc".into()),
                ..Default::default()
            },
            IngressRule {
                protocol: Protocol::Icmp,
                cidr: Some("2001:db8::/32".into()),
                ..Default::default()
            },
        ];
        stack.add(&SecurityGroupConstruct::new(props(rules))).unwrap();

        let sg = &stack.template().resources["DbSecurityGroup"];
        let ingress = sg.get("SecurityGroupIngress").unwrap();
        assert_eq!(ingress[0]["ToPort"], 5432);
        assert_eq!(ingress[0]["CidrIp"], "10.0.0.0/16");
        assert_eq!(ingress[1]["SourceSecurityGroupId"], "sg-abc");
        assert_eq!(ingress[2]["CidrIpv6"], "2001:db8::/32");
        assert_eq!(ingress[2]["FromPort"], -1);
        assert!(sg.get("SecurityGroupEgress").is_none());
        assert_eq!(sg.get("GroupDescription").unwrap(), "Security group for db");
    }

    #[test]
    fn test_missing_vpc() {
        let mut stack = Stack::new(StackContext::default());
        let mut p = props(vec![]);
        p.vpc_id = None;
        assert_eq!(
            stack.add(&SecurityGroupConstruct::new(p)).unwrap_err(),
            ConstructError::missing("db", "vpc_id")
        );
    }

    #[test]
    fn test_source_conflict() {
        let mut stack = Stack::new(StackContext::default());
        let rules = vec![IngressRule {
            from_port: Some(80),
            cidr: Some("0.0.0.0/0".into()),
            source_security_group_id: Some("sg-1".into()),
            ..Default::default()
        }];
        assert!(matches!(
            stack.add(&SecurityGroupConstruct::new(props(rules))),
            Err(ConstructError::Conflict { .. })
        ));
    }

    #[test]
    fn test_invalid_port_range() {
        let mut stack = Stack::new(StackContext::default());
        let rules = vec![IngressRule {
            from_port: Some(9000),
            to_port: Some(8000),
            cidr: Some("0.0.0.0/0".into()),
            ..Default::default()
        }];
        assert!(matches!(
            stack.add(&SecurityGroupConstruct::new(props(rules))),
            Err(ConstructError::Invalid { field: "ingress", .. })
        ));
    }

    #[test]
    fn test_restricted_egress() {
        let mut stack = Stack::new(StackContext::default());
        let mut p = props(vec![]);
        p.allow_all_outbound = false;
        stack.add(&SecurityGroupConstruct::new(p)).unwrap();
        let sg = &stack.template().resources["DbSecurityGroup"];
        assert_eq!(sg.get("SecurityGroupEgress").unwrap()[0]["CidrIp"], "255.255.255.255/32");
    }
}
