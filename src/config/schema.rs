//! Configuration schema definitions.
//!
//! An app file declares the stack context and an ordered list of constructs.
//! All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};

use crate::api::{HttpApiProps, McpServerProps, RestApiProps, WebSocketApiProps};
use crate::api::{HttpApiConstruct, McpServerConstruct, RestApiConstruct, WebSocketApiConstruct};
use crate::cdn::{DistributionConstruct, DistributionProps, SsrSiteConstruct, SsrSiteProps};
use crate::compute::{FunctionConstruct, FunctionProps};
use crate::dns::{CertificateConstruct, CertificateProps, DnsRecordConstruct, DnsRecordProps};
use crate::network::{SecurityGroupConstruct, SecurityGroupProps};
use crate::storage::{QueueConstruct, QueueProps, RateLimitTableConstruct, RateLimitTableProps};
use crate::storage::{SecretConstruct, SecretProps, TableConstruct, TableProps};
use crate::synth::{self, Construct, ConstructResult, StackContext, Template};
use crate::waf::{WebAclConstruct, WebAclProps};

/// Root of an app file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Template description.
    pub description: Option<String>,

    /// Deployment target.
    pub stack: StackContext,

    /// Constructs in declaration order. References only resolve backwards.
    pub constructs: Vec<ConstructConfig>,
}

/// One entry of `[[constructs]]`, selected by its `type` key.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstructConfig {
    Function(FunctionProps),
    Table(TableProps),
    RateLimitTable(RateLimitTableProps),
    Queue(QueueProps),
    Secret(SecretProps),
    SecurityGroup(SecurityGroupProps),
    Certificate(CertificateProps),
    DnsRecord(DnsRecordProps),
    WebAcl(WebAclProps),
    Distribution(DistributionProps),
    SsrSite(SsrSiteProps),
    RestApi(RestApiProps),
    HttpApi(HttpApiProps),
    #[serde(rename = "websocket_api")]
    WebSocketApi(WebSocketApiProps),
    McpServer(McpServerProps),
}

/// What a cross-construct reference must resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Function,
    Certificate,
    WebAcl,
}

impl ReferenceKind {
    /// The `type` tag a referenced construct must carry.
    pub fn construct_type(self) -> &'static str {
        match self {
            ReferenceKind::Function => "function",
            ReferenceKind::Certificate => "certificate",
            ReferenceKind::WebAcl => "web_acl",
        }
    }
}

/// A reference from one construct field to another construct id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    pub field: &'static str,
    pub kind: ReferenceKind,
    pub target: &'a str,
}

impl<'a> Reference<'a> {
    fn new(field: &'static str, kind: ReferenceKind, target: &'a str) -> Self {
        Self { field, kind, target }
    }
}

fn functions<'a>(field: &'static str, ids: &'a [String]) -> impl Iterator<Item = Reference<'a>> {
    ids.iter()
        .map(move |id| Reference::new(field, ReferenceKind::Function, id))
}

fn optional<'a>(
    field: &'static str,
    kind: ReferenceKind,
    id: &'a Option<String>,
) -> Option<Reference<'a>> {
    id.as_deref().map(|id| Reference::new(field, kind, id))
}

impl ConstructConfig {
    pub fn id(&self) -> &str {
        match self {
            ConstructConfig::Function(p) => &p.id,
            ConstructConfig::Table(p) => &p.id,
            ConstructConfig::RateLimitTable(p) => &p.id,
            ConstructConfig::Queue(p) => &p.id,
            ConstructConfig::Secret(p) => &p.id,
            ConstructConfig::SecurityGroup(p) => &p.id,
            ConstructConfig::Certificate(p) => &p.id,
            ConstructConfig::DnsRecord(p) => &p.id,
            ConstructConfig::WebAcl(p) => &p.id,
            ConstructConfig::Distribution(p) => &p.id,
            ConstructConfig::SsrSite(p) => &p.id,
            ConstructConfig::RestApi(p) => &p.id,
            ConstructConfig::HttpApi(p) => &p.id,
            ConstructConfig::WebSocketApi(p) => &p.id,
            ConstructConfig::McpServer(p) => &p.id,
        }
    }

    /// The `type` tag of this entry.
    pub fn kind(&self) -> &'static str {
        match self {
            ConstructConfig::Function(_) => "function",
            ConstructConfig::Table(_) => "table",
            ConstructConfig::RateLimitTable(_) => "rate_limit_table",
            ConstructConfig::Queue(_) => "queue",
            ConstructConfig::Secret(_) => "secret",
            ConstructConfig::SecurityGroup(_) => "security_group",
            ConstructConfig::Certificate(_) => "certificate",
            ConstructConfig::DnsRecord(_) => "dns_record",
            ConstructConfig::WebAcl(_) => "web_acl",
            ConstructConfig::Distribution(_) => "distribution",
            ConstructConfig::SsrSite(_) => "ssr_site",
            ConstructConfig::RestApi(_) => "rest_api",
            ConstructConfig::HttpApi(_) => "http_api",
            ConstructConfig::WebSocketApi(_) => "websocket_api",
            ConstructConfig::McpServer(_) => "mcp_server",
        }
    }

    /// Every id this entry points at, with the field it came from.
    pub fn references(&self) -> Vec<Reference<'_>> {
        use ReferenceKind::{Certificate, Function, WebAcl};

        let mut refs = Vec::new();
        match self {
            ConstructConfig::Table(p) => {
                refs.extend(functions("functions", &p.functions));
                refs.extend(functions("read_functions", &p.read_functions));
            }
            ConstructConfig::RateLimitTable(p) => refs.extend(functions("functions", &p.functions)),
            ConstructConfig::Queue(p) => {
                refs.extend(functions("consumers", &p.consumers));
                refs.extend(functions("producers", &p.producers));
            }
            ConstructConfig::Secret(p) => refs.extend(functions("readers", &p.readers)),
            ConstructConfig::Distribution(p) => {
                refs.extend(optional("certificate", Certificate, &p.edge.certificate));
                refs.extend(optional("web_acl", WebAcl, &p.edge.web_acl));
            }
            ConstructConfig::SsrSite(p) => {
                refs.extend(optional("ssr_function", Function, &p.ssr_function));
                refs.extend(optional("certificate", Certificate, &p.edge.certificate));
                refs.extend(optional("web_acl", WebAcl, &p.edge.web_acl));
            }
            ConstructConfig::RestApi(p) => {
                refs.extend(optional("handler", Function, &p.handler));
                refs.extend(optional("web_acl", WebAcl, &p.web_acl));
                if let Some(domain) = &p.domain {
                    refs.extend(optional("domain.certificate", Certificate, &domain.certificate));
                }
            }
            ConstructConfig::HttpApi(p) => {
                refs.extend(optional("handler", Function, &p.handler));
                if let Some(domain) = &p.domain {
                    refs.extend(optional("domain.certificate", Certificate, &domain.certificate));
                }
            }
            ConstructConfig::WebSocketApi(p) => {
                refs.extend(optional("handler", Function, &p.handler));
                refs.extend(
                    p.routes
                        .iter()
                        .map(|r| Reference::new("routes.handler", Function, &r.handler)),
                );
                if let Some(domain) = &p.domain {
                    refs.extend(optional("domain.certificate", Certificate, &domain.certificate));
                }
            }
            ConstructConfig::McpServer(p) => {
                refs.extend(optional("handler", Function, &p.handler));
                if let Some(domain) = &p.domain {
                    refs.extend(optional("domain.certificate", Certificate, &domain.certificate));
                }
            }
            ConstructConfig::Function(_)
            | ConstructConfig::SecurityGroup(_)
            | ConstructConfig::Certificate(_)
            | ConstructConfig::DnsRecord(_)
            | ConstructConfig::WebAcl(_) => {}
        }
        refs
    }

    /// Build the construct this entry describes.
    pub fn to_construct(&self) -> Box<dyn Construct> {
        match self {
            ConstructConfig::Function(p) => Box::new(FunctionConstruct::new(p.clone())),
            ConstructConfig::Table(p) => Box::new(TableConstruct::new(p.clone())),
            ConstructConfig::RateLimitTable(p) => Box::new(RateLimitTableConstruct::new(p.clone())),
            ConstructConfig::Queue(p) => Box::new(QueueConstruct::new(p.clone())),
            ConstructConfig::Secret(p) => Box::new(SecretConstruct::new(p.clone())),
            ConstructConfig::SecurityGroup(p) => Box::new(SecurityGroupConstruct::new(p.clone())),
            ConstructConfig::Certificate(p) => Box::new(CertificateConstruct::new(p.clone())),
            ConstructConfig::DnsRecord(p) => Box::new(DnsRecordConstruct::new(p.clone())),
            ConstructConfig::WebAcl(p) => Box::new(WebAclConstruct::new(p.clone())),
            ConstructConfig::Distribution(p) => Box::new(DistributionConstruct::new(p.clone())),
            ConstructConfig::SsrSite(p) => Box::new(SsrSiteConstruct::new(p.clone())),
            ConstructConfig::RestApi(p) => Box::new(RestApiConstruct::new(p.clone())),
            ConstructConfig::HttpApi(p) => Box::new(HttpApiConstruct::new(p.clone())),
            ConstructConfig::WebSocketApi(p) => Box::new(WebSocketApiConstruct::new(p.clone())),
            ConstructConfig::McpServer(p) => Box::new(McpServerConstruct::new(p.clone())),
        }
    }
}

impl AppConfig {
    /// Synthesize every construct, in order, into one template.
    pub fn synthesize(&self) -> ConstructResult<Template> {
        let constructs: Vec<Box<dyn Construct>> =
            self.constructs.iter().map(ConstructConfig::to_construct).collect();
        let refs: Vec<&dyn Construct> = constructs.iter().map(|c| c.as_ref()).collect();
        synth::synthesize(self.stack.clone(), self.description.as_deref(), &refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = r#"
        description = "orders service"

        [stack]
        name = "orders"
        region = "eu-west-1"

        [[constructs]]
        type = "function"
        id = "api"
        code = { s3_bucket = "artifacts", s3_key = "api.zip" }

        [[constructs]]
        type = "table"
        id = "orders"
        partition_key = { name = "pk", type = "S" }
        functions = ["api"]

        [[constructs]]
        type = "websocket_api"
        id = "live"
        handler = "api"
        routes = [{ route_key = "subscribe", handler = "api" }]
    "#;

    #[test]
    fn test_parse_tagged_constructs() {
        let config: AppConfig = toml::from_str(APP).unwrap();
        assert_eq!(config.stack.name, "orders");
        assert_eq!(config.stack.partition, "aws");
        let kinds: Vec<_> = config.constructs.iter().map(ConstructConfig::kind).collect();
        assert_eq!(kinds, vec!["function", "table", "websocket_api"]);

        match &config.constructs[1] {
            ConstructConfig::Table(p) => {
                assert_eq!(p.ttl_attribute, "ttl");
                assert!(p.point_in_time_recovery);
            }
            other => panic!("unexpected construct {other:?}"),
        }
    }

    #[test]
    fn test_references() {
        let config: AppConfig = toml::from_str(APP).unwrap();
        let refs = config.constructs[2].references();
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.kind == ReferenceKind::Function && r.target == "api"));
        assert_eq!(refs[1].field, "routes.handler");
        assert!(config.constructs[0].references().is_empty());
    }

    #[test]
    fn test_kind_matches_construct() {
        let config: AppConfig = toml::from_str(APP).unwrap();
        for entry in &config.constructs {
            assert_eq!(entry.to_construct().kind(), entry.kind());
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = toml::from_str::<AppConfig>(
            r#"
            [stack]
            name = "a"
            region = "us-east-1"

            [[constructs]]
            type = "bucket"
            id = "x"
            "#,
        );
        assert!(err.is_err());
    }
}
