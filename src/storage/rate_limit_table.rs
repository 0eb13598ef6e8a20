//! Fixed-schema table backing request rate limiting.

use serde::{Deserialize, Serialize};

use crate::storage::table::{bind_table, AttributeType, KeyAttribute, TableConstruct, TableProps};
use crate::synth::{Construct, ConstructResult, RemovalPolicy, Stack};

/// Environment key carrying the rate-limit table name.
pub const RATE_LIMIT_TABLE_ENV: &str = "RATE_LIMIT_TABLE_NAME";

/// Props for [`RateLimitTableConstruct`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitTableProps {
    pub id: String,
    pub table_name: Option<String>,
    /// Functions enforcing limits; all get read/write access.
    pub functions: Vec<String>,
    pub removal_policy: RemovalPolicy,
}

/// Table with `PK`/`SK` string keys and a `ttl` expiry attribute.
#[derive(Debug, Clone)]
pub struct RateLimitTableConstruct {
    pub props: RateLimitTableProps,
}

impl RateLimitTableConstruct {
    pub fn new(props: RateLimitTableProps) -> Self {
        Self { props }
    }

    fn table(&self) -> TableConstruct {
        TableConstruct::new(TableProps {
            id: self.props.id.clone(),
            table_name: self.props.table_name.clone(),
            partition_key: Some(KeyAttribute::new("PK", AttributeType::S)),
            sort_key: Some(KeyAttribute::new("SK", AttributeType::S)),
            point_in_time_recovery: false,
            removal_policy: self.props.removal_policy,
            ..Default::default()
        })
    }
}

impl Construct for RateLimitTableConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "rate_limit_table"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        let writers = stack.functions(&self.props.id, &self.props.functions)?;
        let table_id = self.table().build(stack)?;
        bind_table(stack, &table_id, RATE_LIMIT_TABLE_ENV, &writers, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::function::tests::stack_with_functions;
    use serde_json::json;

    #[test]
    fn test_fixed_schema_and_binding() {
        let mut stack = stack_with_functions(&["api"]);
        stack
            .add(&RateLimitTableConstruct::new(RateLimitTableProps {
                id: "limits".into(),
                functions: vec!["api".into()],
                ..Default::default()
            }))
            .unwrap();

        let table = stack.resource("LimitsTable").unwrap();
        assert_eq!(
            table.get("KeySchema").unwrap(),
            &json!([
                { "AttributeName": "PK", "KeyType": "HASH" },
                { "AttributeName": "SK", "KeyType": "RANGE" },
            ])
        );
        assert_eq!(table.get("TimeToLiveSpecification").unwrap()["AttributeName"], "ttl");

        let env = stack.resource("ApiFunction").unwrap().get("Environment").unwrap();
        assert_eq!(
            env["Variables"][RATE_LIMIT_TABLE_ENV],
            json!({ "Ref": "LimitsTable" })
        );
        assert!(env["Variables"].get("DYNAMODB_TABLE").is_none());
    }
}
