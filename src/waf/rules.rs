//! Web ACL rule builder.
//!
//! # Responsibilities
//! - Assign strictly increasing priorities starting at 1
//! - Append rules in a fixed order independent of how the input was written:
//!   rate limit → managed groups (SQLi, XSS, known bad inputs) → IP allow
//!   list → IP deny list → geo block
//! - Render each rule with its own metric name

use serde_json::{json, Value};

/// Managed rule group protecting against SQL injection.
pub const SQLI_RULE_SET: &str = "AWSManagedRulesSQLiRuleSet";
/// Managed rule group that carries the cross-site scripting rules.
pub const XSS_RULE_SET: &str = "AWSManagedRulesCommonRuleSet";
/// Managed rule group for request patterns known to be malicious.
pub const KNOWN_BAD_INPUTS_RULE_SET: &str = "AWSManagedRulesKnownBadInputsRuleSet";

const MANAGED_VENDOR: &str = "AWS";

/// Rule match condition.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleStatement {
    /// Requests per 5-minute window per client IP.
    RateBased { limit: u32 },
    ManagedRuleGroup { vendor: &'static str, name: &'static str },
    IpSetReference { arn: Value },
    GeoMatch { country_codes: Vec<String> },
}

impl RuleStatement {
    fn to_value(&self) -> Value {
        match self {
            RuleStatement::RateBased { limit } => json!({
                "RateBasedStatement": { "Limit": limit, "AggregateKeyType": "IP" }
            }),
            RuleStatement::ManagedRuleGroup { vendor, name } => json!({
                "ManagedRuleGroupStatement": { "VendorName": vendor, "Name": name }
            }),
            RuleStatement::IpSetReference { arn } => json!({
                "IPSetReferenceStatement": { "Arn": arn }
            }),
            RuleStatement::GeoMatch { country_codes } => json!({
                "GeoMatchStatement": { "CountryCodes": country_codes }
            }),
        }
    }
}

/// What happens to a matching request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    Allow,
    /// Block, optionally answering with a custom status code.
    Block { response_code: Option<u16> },
    /// Managed groups keep their own per-rule actions.
    ManagedDefault,
}

/// One rendered rule.
#[derive(Debug, Clone, PartialEq)]
pub struct WafRule {
    pub name: String,
    pub priority: u32,
    pub statement: RuleStatement,
    pub action: RuleAction,
    pub metric_name: String,
}

impl WafRule {
    pub fn to_value(&self) -> Value {
        let mut rule = json!({
            "Name": self.name,
            "Priority": self.priority,
            "Statement": self.statement.to_value(),
            "VisibilityConfig": visibility_config(&self.metric_name),
        });
        match &self.action {
            RuleAction::Allow => rule["Action"] = json!({ "Allow": {} }),
            RuleAction::Block { response_code: None } => rule["Action"] = json!({ "Block": {} }),
            RuleAction::Block {
                response_code: Some(code),
            } => {
                rule["Action"] = json!({ "Block": { "CustomResponse": { "ResponseCode": code } } })
            }
            RuleAction::ManagedDefault => rule["OverrideAction"] = json!({ "None": {} }),
        }
        rule
    }
}

/// Visibility block shared by rules and the ACL itself.
pub fn visibility_config(metric_name: &str) -> Value {
    json!({
        "SampledRequestsEnabled": true,
        "CloudWatchMetricsEnabled": true,
        "MetricName": metric_name,
    })
}

/// Appends rules and hands out priorities.
#[derive(Debug, Default)]
pub struct WafRuleBuilder {
    metric_prefix: String,
    rules: Vec<WafRule>,
}

impl WafRuleBuilder {
    pub fn new(metric_prefix: impl Into<String>) -> Self {
        Self {
            metric_prefix: metric_prefix.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule with the next priority and return that priority.
    pub fn push(&mut self, name: &str, statement: RuleStatement, action: RuleAction) -> u32 {
        let priority = self.rules.last().map_or(1, |r| r.priority + 1);
        self.rules.push(WafRule {
            name: name.to_string(),
            priority,
            statement,
            action,
            metric_name: format!("{}{}", self.metric_prefix, name),
        });
        priority
    }

    pub fn build(self) -> Vec<WafRule> {
        self.rules
    }
}

/// Enabled protections, already validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WafRuleSet {
    pub rate_limit: Option<u32>,
    pub sql_injection: bool,
    pub xss: bool,
    pub known_bad_inputs: bool,
    /// ARN of the allow-list IP set, when the list is non-empty.
    pub ip_allow_list: Option<Value>,
    /// ARN of the deny-list IP set, when the list is non-empty.
    pub ip_deny_list: Option<Value>,
    pub geo_block: Vec<String>,
}

/// Build the ordered rule list for a rule set.
pub fn build_rules(metric_prefix: &str, set: &WafRuleSet) -> Vec<WafRule> {
    let mut builder = WafRuleBuilder::new(metric_prefix);

    if let Some(limit) = set.rate_limit {
        builder.push(
            "RateLimit",
            RuleStatement::RateBased { limit },
            RuleAction::Block {
                response_code: Some(429),
            },
        );
    }

    let managed = [
        (set.sql_injection, SQLI_RULE_SET),
        (set.xss, XSS_RULE_SET),
        (set.known_bad_inputs, KNOWN_BAD_INPUTS_RULE_SET),
    ];
    for (enabled, group) in managed {
        if enabled {
            builder.push(
                group,
                RuleStatement::ManagedRuleGroup {
                    vendor: MANAGED_VENDOR,
                    name: group,
                },
                RuleAction::ManagedDefault,
            );
        }
    }

    if let Some(arn) = &set.ip_allow_list {
        builder.push(
            "IpAllowList",
            RuleStatement::IpSetReference { arn: arn.clone() },
            RuleAction::Allow,
        );
    }
    if let Some(arn) = &set.ip_deny_list {
        builder.push(
            "IpDenyList",
            RuleStatement::IpSetReference { arn: arn.clone() },
            RuleAction::Block { response_code: None },
        );
    }
    if !set.geo_block.is_empty() {
        builder.push(
            "GeoBlock",
            RuleStatement::GeoMatch {
                country_codes: set.geo_block.clone(),
            },
            RuleAction::Block { response_code: None },
        );
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priorities(rules: &[WafRule]) -> Vec<(String, u32)> {
        rules.iter().map(|r| (r.name.clone(), r.priority)).collect()
    }

    #[test]
    fn test_rate_sqli_geo_priorities() {
        let set = WafRuleSet {
            rate_limit: Some(2000),
            sql_injection: true,
            geo_block: vec!["KP".into()],
            ..Default::default()
        };
        let rules = build_rules("edge", &set);
        assert_eq!(
            priorities(&rules),
            vec![
                ("RateLimit".to_string(), 1),
                (SQLI_RULE_SET.to_string(), 2),
                ("GeoBlock".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_full_order() {
        let set = WafRuleSet {
            rate_limit: Some(500),
            sql_injection: true,
            xss: true,
            known_bad_inputs: true,
            ip_allow_list: Some(json!("arn:allow")),
            ip_deny_list: Some(json!("arn:deny")),
            geo_block: vec!["RU".into()],
        };
        let rules = build_rules("", &set);
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "RateLimit",
                SQLI_RULE_SET,
                XSS_RULE_SET,
                KNOWN_BAD_INPUTS_RULE_SET,
                "IpAllowList",
                "IpDenyList",
                "GeoBlock",
            ]
        );
        let prios: Vec<u32> = rules.iter().map(|r| r.priority).collect();
        assert_eq!(prios, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_set_yields_no_rules() {
        assert!(build_rules("x", &WafRuleSet::default()).is_empty());
    }

    #[test]
    fn test_rendered_actions() {
        let set = WafRuleSet {
            rate_limit: Some(2000),
            known_bad_inputs: true,
            ip_allow_list: Some(json!({ "Fn::GetAtt": ["Allow", "Arn"] })),
            ..Default::default()
        };
        let rules: Vec<Value> = build_rules("api", &set).iter().map(WafRule::to_value).collect();

        assert_eq!(
            rules[0]["Action"],
            json!({ "Block": { "CustomResponse": { "ResponseCode": 429 } } })
        );
        assert_eq!(rules[0]["Statement"]["RateBasedStatement"]["Limit"], 2000);
        assert_eq!(rules[0]["VisibilityConfig"]["MetricName"], "apiRateLimit");

        assert_eq!(rules[1]["OverrideAction"], json!({ "None": {} }));
        assert!(rules[1].get("Action").is_none());

        assert_eq!(rules[2]["Action"], json!({ "Allow": {} }));
        assert_eq!(
            rules[2]["Statement"]["IPSetReferenceStatement"]["Arn"],
            json!({ "Fn::GetAtt": ["Allow", "Arn"] })
        );
    }

    #[test]
    fn test_builder_priorities_strictly_increase() {
        let mut builder = WafRuleBuilder::new("m");
        let a = builder.push("A", RuleStatement::RateBased { limit: 100 }, RuleAction::Allow);
        let b = builder.push("B", RuleStatement::RateBased { limit: 100 }, RuleAction::Allow);
        assert_eq!((a, b), (1, 2));
    }
}
