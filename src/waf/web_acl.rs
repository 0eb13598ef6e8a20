//! Web ACL construct.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::network::cidr::Cidr;
use crate::synth::intrinsics::get_att;
use crate::synth::{
    logical_id, Construct, ConstructError, ConstructResult, Resource, Stack, WebAclRef,
};
use crate::waf::rules::{build_rules, visibility_config, WafRule, WafRuleSet};

static COUNTRY_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid regex"));
static ACL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("valid regex"));

const MIN_RATE_LIMIT: u32 = 100;
const MAX_RATE_LIMIT: u32 = 2_000_000_000;

/// Where the ACL can be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WafScope {
    /// API Gateway stages, load balancers.
    #[default]
    Regional,
    /// CloudFront distributions; must be deployed in us-east-1.
    Cloudfront,
}

impl WafScope {
    pub fn as_str(self) -> &'static str {
        match self {
            WafScope::Regional => "REGIONAL",
            WafScope::Cloudfront => "CLOUDFRONT",
        }
    }
}

/// Rate limiting settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitProps {
    pub enabled: bool,
    /// Requests per 5 minutes per client IP (default: 2000).
    pub limit: u32,
}

impl Default for RateLimitProps {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 2000,
        }
    }
}

/// Props for [`WebAclConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WebAclProps {
    pub id: String,
    /// ACL name (default: the construct id).
    pub name: Option<String>,
    pub scope: WafScope,
    pub rate_limit: RateLimitProps,
    pub sql_injection_protection: bool,
    pub xss_protection: bool,
    pub known_bad_inputs_protection: bool,
    pub ip_allow_list: Vec<String>,
    pub ip_deny_list: Vec<String>,
    /// ISO 3166 alpha-2 country codes to block.
    pub geo_blocking: Vec<String>,
    /// Prefix for rule metric names (default: the ACL name).
    pub metric_prefix: Option<String>,
    /// Regional resource ARNs to associate with the ACL.
    pub associate_with: Vec<String>,
}

impl Default for WebAclProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: None,
            scope: WafScope::default(),
            rate_limit: RateLimitProps::default(),
            sql_injection_protection: true,
            xss_protection: true,
            known_bad_inputs_protection: true,
            ip_allow_list: Vec::new(),
            ip_deny_list: Vec::new(),
            geo_blocking: Vec::new(),
            metric_prefix: None,
            associate_with: Vec::new(),
        }
    }
}

/// Web ACL with managed protections, IP sets and geo blocking.
#[derive(Debug, Clone)]
pub struct WebAclConstruct {
    pub props: WebAclProps,
}

/// Normalized IP list with its address version.
struct IpList {
    version: &'static str,
    addresses: Vec<String>,
}

fn parse_ip_list(
    construct: &str,
    field: &'static str,
    entries: &[String],
) -> ConstructResult<Option<IpList>> {
    if entries.is_empty() {
        return Ok(None);
    }
    let mut addresses = Vec::with_capacity(entries.len());
    let mut v4 = false;
    let mut v6 = false;
    for entry in entries {
        let cidr = Cidr::parse(entry)
            .map_err(|reason| ConstructError::invalid(construct, field, reason))?;
        if cidr.is_ipv4() {
            v4 = true;
        } else {
            v6 = true;
        }
        let normalized = cidr.to_string();
        if !addresses.contains(&normalized) {
            addresses.push(normalized);
        }
    }
    if v4 && v6 {
        return Err(ConstructError::invalid(
            construct,
            field,
            "cannot mix IPv4 and IPv6 addresses in one list",
        ));
    }
    Ok(Some(IpList {
        version: if v4 { "IPV4" } else { "IPV6" },
        addresses,
    }))
}

impl WebAclConstruct {
    pub fn new(props: WebAclProps) -> Self {
        Self { props }
    }

    fn acl_name(&self) -> &str {
        self.props.name.as_deref().unwrap_or(&self.props.id)
    }

    /// Validate props and render the rule list.
    pub fn rules(
        &self,
        allow_arn: Option<Value>,
        deny_arn: Option<Value>,
    ) -> ConstructResult<Vec<WafRule>> {
        let p = &self.props;
        let rate_limit = if p.rate_limit.enabled {
            if !(MIN_RATE_LIMIT..=MAX_RATE_LIMIT).contains(&p.rate_limit.limit) {
                return Err(ConstructError::invalid(
                    &p.id,
                    "rate_limit.limit",
                    format!("must be between {MIN_RATE_LIMIT} and {MAX_RATE_LIMIT}"),
                ));
            }
            Some(p.rate_limit.limit)
        } else {
            None
        };

        let mut geo_block: Vec<String> = Vec::new();
        for code in &p.geo_blocking {
            if !COUNTRY_CODE.is_match(code) {
                return Err(ConstructError::invalid(
                    &p.id,
                    "geo_blocking",
                    format!("`{code}` is not a two-letter uppercase country code"),
                ));
            }
            if !geo_block.contains(code) {
                geo_block.push(code.clone());
            }
        }

        let prefix = p.metric_prefix.clone().unwrap_or_else(|| self.acl_name().to_string());
        Ok(build_rules(
            &prefix,
            &WafRuleSet {
                rate_limit,
                sql_injection: p.sql_injection_protection,
                xss: p.xss_protection,
                known_bad_inputs: p.known_bad_inputs_protection,
                ip_allow_list: allow_arn,
                ip_deny_list: deny_arn,
                geo_block,
            },
        ))
    }

    fn add_ip_set(
        &self,
        stack: &mut Stack,
        suffix: &str,
        list: IpList,
    ) -> ConstructResult<Value> {
        let id = stack.add_resource(
            logical_id(&[&self.props.id, suffix]),
            Resource::new(
                "AWS::WAFv2::IPSet",
                json!({
                    "Name": format!("{}-{}", self.acl_name(), suffix.to_ascii_lowercase()),
                    "Scope": self.props.scope.as_str(),
                    "IPAddressVersion": list.version,
                    "Addresses": list.addresses,
                }),
            ),
        )?;
        Ok(get_att(&id, "Arn"))
    }
}

impl Construct for WebAclConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "web_acl"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let p = &self.props;
        if p.id.trim().is_empty() {
            return Err(ConstructError::missing("web_acl", "id"));
        }
        let name = self.acl_name().to_string();
        if !ACL_NAME.is_match(&name) {
            return Err(ConstructError::invalid(
                &p.id,
                "name",
                "must be 1-128 letters, digits, hyphens or underscores",
            ));
        }
        if p.scope == WafScope::Cloudfront && !stack.context().is_global_region() {
            return Err(ConstructError::dependency(
                &p.id,
                "scope = \"cloudfront\"",
                "stack region us-east-1",
            ));
        }
        if p.scope == WafScope::Cloudfront && !p.associate_with.is_empty() {
            return Err(ConstructError::invalid(
                &p.id,
                "associate_with",
                "CloudFront ACLs are attached through the distribution",
            ));
        }

        let allow = parse_ip_list(&p.id, "ip_allow_list", &p.ip_allow_list)?;
        let deny = parse_ip_list(&p.id, "ip_deny_list", &p.ip_deny_list)?;
        if let (Some(allow), Some(deny)) = (&allow, &deny) {
            if let Some(both) = deny.addresses.iter().find(|a| allow.addresses.contains(a)) {
                return Err(ConstructError::invalid(
                    &p.id,
                    "ip_deny_list",
                    format!("`{both}` also appears in ip_allow_list"),
                ));
            }
        }
        if allow.is_some() && deny.is_none() && p.geo_blocking.is_empty() {
            tracing::warn!(
                construct = %p.id,
                "IP allow list only bypasses deny and geo rules, and none are configured"
            );
        }

        // Validate before emitting anything.
        let placeholder = allow.as_ref().map(|_| Value::Null);
        self.rules(placeholder.clone(), deny.as_ref().map(|_| Value::Null))?;

        let allow_arn = match allow {
            Some(list) => Some(self.add_ip_set(stack, "AllowList", list)?),
            None => None,
        };
        let deny_arn = match deny {
            Some(list) => Some(self.add_ip_set(stack, "DenyList", list)?),
            None => None,
        };
        let rules: Vec<Value> = self
            .rules(allow_arn, deny_arn)?
            .iter()
            .map(WafRule::to_value)
            .collect();
        tracing::debug!(construct = %p.id, rules = rules.len(), "Web ACL rules compiled");

        let metric = p.metric_prefix.clone().unwrap_or_else(|| name.clone());
        let acl_id = stack.add_resource(
            logical_id(&[&p.id, "WebAcl"]),
            Resource::new(
                "AWS::WAFv2::WebACL",
                json!({
                    "Name": name,
                    "Scope": p.scope.as_str(),
                    "DefaultAction": { "Allow": {} },
                    "VisibilityConfig": visibility_config(&metric),
                    "Rules": rules,
                }),
            ),
        )?;
        let arn = get_att(&acl_id, "Arn");

        for (i, resource_arn) in p.associate_with.iter().enumerate() {
            associate_web_acl(
                stack,
                &logical_id(&[&p.id, "Association", &(i + 1).to_string()]),
                arn.clone(),
                json!(resource_arn),
                None,
            )?;
        }

        stack.add_exported_output(logical_id(&[&p.id, "WebAclArn"]), arn.clone(), "Web ACL ARN")?;
        stack.register_web_acl(&p.id, WebAclRef { arn, scope: p.scope })
    }
}

/// Associate a regional web ACL with a resource.
pub fn associate_web_acl(
    stack: &mut Stack,
    logical_id: &str,
    web_acl_arn: Value,
    resource_arn: Value,
    depends_on: Option<&str>,
) -> ConstructResult<String> {
    let mut resource = Resource::new(
        "AWS::WAFv2::WebACLAssociation",
        json!({ "ResourceArn": resource_arn, "WebACLArn": web_acl_arn }),
    );
    if let Some(dep) = depends_on {
        resource = resource.depends_on(dep);
    }
    stack.add_resource(logical_id, resource)
}
