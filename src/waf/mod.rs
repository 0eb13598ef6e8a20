//! Web application firewall subsystem.
//!
//! # Data Flow
//! ```text
//! WebAclProps (protections to enable)
//!     → web_acl.rs (validate lists, country codes, scope/region)
//!     → IP sets (one per non-empty list)
//!     → rules.rs (fixed-order rule list, priorities 1..n)
//!     → WebACL (default action allow) + optional associations
//! ```
//!
//! # Design Decisions
//! - Rule order never depends on input field order
//! - Default action is allow; rules carve out blocks
//! - Allow list runs after managed groups and before deny/geo rules

pub mod rules;
pub mod web_acl;

pub use rules::{build_rules, RuleAction, RuleStatement, WafRule, WafRuleBuilder, WafRuleSet};
pub use web_acl::{associate_web_acl, RateLimitProps, WafScope, WebAclConstruct, WebAclProps};
