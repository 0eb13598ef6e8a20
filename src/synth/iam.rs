//! IAM policy statements and the action sets constructs grant.

use serde_json::{json, Value};

pub const DYNAMODB_READ_ACTIONS: &[&str] = &[
    "dynamodb:BatchGetItem",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DescribeTable",
    "dynamodb:GetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:Query",
    "dynamodb:Scan",
];

pub const DYNAMODB_WRITE_ACTIONS: &[&str] = &[
    "dynamodb:BatchWriteItem",
    "dynamodb:DeleteItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
];

pub const SQS_CONSUME_ACTIONS: &[&str] = &[
    "sqs:ChangeMessageVisibility",
    "sqs:DeleteMessage",
    "sqs:GetQueueAttributes",
    "sqs:GetQueueUrl",
    "sqs:ReceiveMessage",
];

pub const SQS_SEND_ACTIONS: &[&str] = &[
    "sqs:GetQueueAttributes",
    "sqs:GetQueueUrl",
    "sqs:SendMessage",
];

pub const SECRET_READ_ACTIONS: &[&str] = &[
    "secretsmanager:DescribeSecret",
    "secretsmanager:GetSecretValue",
];

pub const S3_READ_ACTIONS: &[&str] = &["s3:GetBucket*", "s3:GetObject*", "s3:List*"];

pub const MANAGE_CONNECTIONS_ACTIONS: &[&str] = &["execute-api:ManageConnections"];

/// Managed policy attached to every function role.
pub const LAMBDA_BASIC_EXECUTION: &str =
    "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// An `Allow` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&str], resources: Vec<Value>) -> Self {
        Self {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            resources,
        }
    }

    /// Union of two action sets on the same resources.
    pub fn allow_all(action_sets: &[&[&str]], resources: Vec<Value>) -> Self {
        let mut actions: Vec<String> = action_sets
            .iter()
            .flat_map(|set| set.iter().map(|a| a.to_string()))
            .collect();
        actions.sort();
        actions.dedup();
        Self { actions, resources }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "Effect": "Allow",
            "Action": self.actions,
            "Resource": self.resources,
        })
    }
}

/// Trust policy letting a service principal assume a role.
pub fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service },
            "Action": "sts:AssumeRole"
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all_dedups_and_sorts() {
        let stmt = PolicyStatement::allow_all(
            &[DYNAMODB_WRITE_ACTIONS, DYNAMODB_READ_ACTIONS],
            vec![json!("arn:table")],
        );
        let mut sorted = stmt.actions.clone();
        sorted.sort();
        assert_eq!(stmt.actions, sorted);
        assert_eq!(stmt.actions.len(), 12);
    }

    #[test]
    fn test_statement_value() {
        let stmt = PolicyStatement::allow(SECRET_READ_ACTIONS, vec![json!("arn:secret")]);
        assert_eq!(
            stmt.to_value(),
            json!({
                "Effect": "Allow",
                "Action": ["secretsmanager:DescribeSecret", "secretsmanager:GetSecretValue"],
                "Resource": ["arn:secret"]
            })
        );
    }
}
