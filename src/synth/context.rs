//! Stack-wide context threaded through every construct.

use serde::{Deserialize, Serialize};

/// Deployment target of the stack being synthesized.
///
/// Constructs read region and partition from here instead of looking them up
/// from an enclosing scope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StackContext {
    /// Stack name, also used as the default export prefix.
    pub name: String,

    /// Deployment region (e.g., "us-east-1").
    pub region: String,

    /// Twelve-digit account id, when known at synthesis time.
    #[serde(default)]
    pub account: Option<String>,

    /// AWS partition.
    #[serde(default = "default_partition")]
    pub partition: String,
}

fn default_partition() -> String {
    "aws".to_string()
}

impl StackContext {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            account: None,
            partition: default_partition(),
        }
    }

    /// Builder-style account setter.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// DNS suffix for service endpoints in this partition.
    pub fn url_suffix(&self) -> &'static str {
        match self.partition.as_str() {
            "aws-cn" => "amazonaws.com.cn",
            _ => "amazonaws.com",
        }
    }

    /// Global services (CloudFront certificates and web ACLs) live in us-east-1.
    pub fn is_global_region(&self) -> bool {
        self.region == "us-east-1"
    }
}

impl Default for StackContext {
    fn default() -> Self {
        Self::new("apptheory", "us-east-1")
    }
}
