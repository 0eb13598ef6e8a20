//! SQS queue construct.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::synth::iam::{PolicyStatement, SQS_CONSUME_ACTIONS, SQS_SEND_ACTIONS};
use crate::synth::intrinsics::{get_att, reference};
use crate::synth::{logical_id, Construct, ConstructError, ConstructResult, Resource, Stack};

const FIFO_SUFFIX: &str = ".fifo";
const MAX_NAME_LEN: usize = 80;
const MAX_BATCHING_WINDOW_SECS: u32 = 300;

/// Dead-letter queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeadLetterProps {
    /// Receives before a message moves to the dead-letter queue (default: 3).
    pub max_receive_count: u32,
    /// Retention of dead letters in seconds (default: 14 days).
    pub retention_period_secs: u32,
}

impl Default for DeadLetterProps {
    fn default() -> Self {
        Self {
            max_receive_count: 3,
            retention_period_secs: 1_209_600,
        }
    }
}

/// Props for [`QueueConstruct`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueProps {
    pub id: String,
    pub queue_name: Option<String>,
    pub fifo: bool,
    pub content_based_deduplication: bool,
    /// Default: 30.
    pub visibility_timeout_secs: u32,
    /// Default: 4 days.
    pub retention_period_secs: u32,
    pub dead_letter_queue: Option<DeadLetterProps>,
    /// Functions consuming the queue through an event source mapping.
    pub consumers: Vec<String>,
    /// Messages per consumer invocation (default: 10).
    pub batch_size: u32,
    /// Seconds a consumer waits to fill a batch. Defaults to 1 when
    /// `batch_size` exceeds 10, which SQS requires.
    pub max_batching_window_secs: Option<u32>,
    /// Functions allowed to send messages.
    pub producers: Vec<String>,
    /// Environment key bound to the queue URL on consumers and producers.
    pub environment_key: Option<String>,
}

impl Default for QueueProps {
    fn default() -> Self {
        Self {
            id: String::new(),
            queue_name: None,
            fifo: false,
            content_based_deduplication: false,
            visibility_timeout_secs: 30,
            retention_period_secs: 345_600,
            dead_letter_queue: None,
            consumers: Vec::new(),
            batch_size: 10,
            max_batching_window_secs: None,
            producers: Vec::new(),
            environment_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConstruct {
    pub props: QueueProps,
}

impl QueueConstruct {
    pub fn new(props: QueueProps) -> Self {
        Self { props }
    }

    /// Physical queue name with the FIFO suffix enforced.
    fn queue_name(&self) -> ConstructResult<Option<String>> {
        let p = &self.props;
        let Some(name) = p.queue_name.as_deref().map(str::trim) else {
            return Ok(None);
        };
        let base = name.strip_suffix(FIFO_SUFFIX).unwrap_or(name);
        if base.len() != name.len() && !p.fifo {
            return Err(ConstructError::dependency(
                &p.id,
                "queue_name",
                "fifo = true for a .fifo name",
            ));
        }
        let valid = !base.is_empty()
            && base.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        let full = if p.fifo {
            format!("{base}{FIFO_SUFFIX}")
        } else {
            base.to_string()
        };
        if !valid || full.len() > MAX_NAME_LEN {
            return Err(ConstructError::invalid(
                &p.id,
                "queue_name",
                "must be 1-80 characters of letters, digits, hyphens or underscores",
            ));
        }
        Ok(Some(full))
    }

    fn validate(&self) -> ConstructResult<()> {
        let p = &self.props;
        if p.id.trim().is_empty() {
            return Err(ConstructError::missing("queue", "id"));
        }
        if p.content_based_deduplication && !p.fifo {
            return Err(ConstructError::dependency(
                &p.id,
                "content_based_deduplication",
                "fifo = true",
            ));
        }
        if p.visibility_timeout_secs > 43_200 {
            return Err(ConstructError::invalid(
                &p.id,
                "visibility_timeout_secs",
                "must be between 0 and 43200 seconds",
            ));
        }
        if !(60..=1_209_600).contains(&p.retention_period_secs) {
            return Err(ConstructError::invalid(
                &p.id,
                "retention_period_secs",
                "must be between 60 and 1209600 seconds",
            ));
        }
        let max_batch = if p.fifo { 10 } else { 10_000 };
        if !(1..=max_batch).contains(&p.batch_size) {
            return Err(ConstructError::invalid(
                &p.id,
                "batch_size",
                format!("must be between 1 and {max_batch}"),
            ));
        }
        if let Some(window) = p.max_batching_window_secs {
            if p.fifo {
                return Err(ConstructError::conflict(&p.id, "max_batching_window_secs", "fifo"));
            }
            if window > MAX_BATCHING_WINDOW_SECS {
                return Err(ConstructError::invalid(
                    &p.id,
                    "max_batching_window_secs",
                    format!("must be at most {MAX_BATCHING_WINDOW_SECS}"),
                ));
            }
            if window == 0 && p.batch_size > 10 {
                return Err(ConstructError::invalid(
                    &p.id,
                    "max_batching_window_secs",
                    "must be at least 1 when batch_size exceeds 10",
                ));
            }
        }
        if let Some(dlq) = &p.dead_letter_queue {
            if !(1..=1000).contains(&dlq.max_receive_count) {
                return Err(ConstructError::invalid(
                    &p.id,
                    "dead_letter_queue.max_receive_count",
                    "must be between 1 and 1000",
                ));
            }
            if !(60..=1_209_600).contains(&dlq.retention_period_secs) {
                return Err(ConstructError::invalid(
                    &p.id,
                    "dead_letter_queue.retention_period_secs",
                    "must be between 60 and 1209600 seconds",
                ));
            }
        }
        if let Some(key) = &p.environment_key {
            if key.trim().is_empty() {
                return Err(ConstructError::invalid(&p.id, "environment_key", "must not be empty"));
            }
        }
        Ok(())
    }
}

impl Construct for QueueConstruct {
    fn id(&self) -> &str {
        &self.props.id
    }

    fn kind(&self) -> &'static str {
        "queue"
    }

    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()> {
        self.validate()?;
        let p = &self.props;
        let name = self.queue_name()?;
        let consumers = stack.functions(&p.id, &p.consumers)?;
        let producers = stack.functions(&p.id, &p.producers)?;

        let mut properties = json!({
            "VisibilityTimeout": p.visibility_timeout_secs,
            "MessageRetentionPeriod": p.retention_period_secs,
            "SqsManagedSseEnabled": true,
        });
        if p.fifo {
            properties["FifoQueue"] = json!(true);
        }
        if p.content_based_deduplication {
            properties["ContentBasedDeduplication"] = json!(true);
        }
        if let Some(name) = &name {
            properties["QueueName"] = json!(name);
        }

        if let Some(dlq) = &p.dead_letter_queue {
            let mut dlq_properties = json!({
                "MessageRetentionPeriod": dlq.retention_period_secs,
                "SqsManagedSseEnabled": true,
            });
            if p.fifo {
                dlq_properties["FifoQueue"] = json!(true);
            }
            if let Some(name) = &name {
                let base = name.strip_suffix(FIFO_SUFFIX).unwrap_or(name);
                let suffix = if p.fifo { FIFO_SUFFIX } else { "" };
                dlq_properties["QueueName"] = json!(format!("{base}-dlq{suffix}"));
            }
            let dlq_id = stack.add_resource(
                logical_id(&[&p.id, "DeadLetterQueue"]),
                Resource::new("AWS::SQS::Queue", dlq_properties),
            )?;
            properties["RedrivePolicy"] = json!({
                "deadLetterTargetArn": get_att(&dlq_id, "Arn"),
                "maxReceiveCount": dlq.max_receive_count,
            });
            stack.add_exported_output(
                logical_id(&[&p.id, "DeadLetterQueueArn"]),
                get_att(&dlq_id, "Arn"),
                "Dead-letter queue ARN",
            )?;
        }

        let queue_id = stack.add_resource(
            logical_id(&[&p.id, "Queue"]),
            Resource::new("AWS::SQS::Queue", properties),
        )?;
        let arn = get_att(&queue_id, "Arn");

        let batching_window = match p.max_batching_window_secs {
            Some(window) => Some(window),
            None if p.batch_size > 10 => Some(1),
            None => None,
        };
        for handle in &consumers {
            handle.grant(stack, PolicyStatement::allow(SQS_CONSUME_ACTIONS, vec![arn.clone()]))?;
            let mut mapping = json!({
                "EventSourceArn": arn,
                "FunctionName": handle.name(),
                "BatchSize": p.batch_size,
                "Enabled": true,
            });
            if let Some(window) = batching_window {
                mapping["MaximumBatchingWindowInSeconds"] = json!(window);
            }
            stack.add_resource(
                logical_id(&[&p.id, &handle.construct_id, "EventSource"]),
                Resource::new("AWS::Lambda::EventSourceMapping", mapping)
                    .depends_on(handle.role_id.clone()),
            )?;
        }
        for handle in &producers {
            handle.grant(stack, PolicyStatement::allow(SQS_SEND_ACTIONS, vec![arn.clone()]))?;
        }
        if let Some(key) = &p.environment_key {
            for handle in consumers.iter().chain(&producers) {
                handle.bind_environment(stack, key, reference(&queue_id))?;
            }
        }

        stack.add_exported_output(
            logical_id(&[&p.id, "QueueUrl"]),
            reference(&queue_id),
            "Queue URL",
        )?;
        stack.add_exported_output(logical_id(&[&p.id, "QueueArn"]), arn, "Queue ARN")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::function::tests::stack_with_functions;

    fn props() -> QueueProps {
        QueueProps {
            id: "jobs".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_queue_with_consumers_and_dlq() {
        let mut stack = stack_with_functions(&["worker", "api"]);
        let mut p = props();
        p.consumers = vec!["worker".into()];
        p.producers = vec!["api".into()];
        p.dead_letter_queue = Some(DeadLetterProps::default());
        p.environment_key = Some("JOBS_QUEUE_URL".into());
        stack.add(&QueueConstruct::new(p)).unwrap();

        let queue = stack.resource("JobsQueue").unwrap();
        assert_eq!(queue.get("VisibilityTimeout").unwrap(), 30);
        assert_eq!(queue.get("RedrivePolicy").unwrap()["maxReceiveCount"], 3);

        let mapping = stack.resource("JobsWorkerEventSource").unwrap();
        assert_eq!(mapping.get("BatchSize").unwrap(), 10);
        assert!(mapping.get("MaximumBatchingWindowInSeconds").is_none());
        assert_eq!(mapping.depends_on, vec!["WorkerServiceRole".to_string()]);

        for function in ["WorkerFunction", "ApiFunction"] {
            let env = stack.resource(function).unwrap().get("Environment").unwrap();
            assert_eq!(env["Variables"]["JOBS_QUEUE_URL"], json!({ "Ref": "JobsQueue" }));
        }
        let api_actions = &stack.resource("ApiServiceRole").unwrap().get("Policies").unwrap()[0]
            ["PolicyDocument"]["Statement"][0]["Action"];
        assert!(api_actions.as_array().unwrap().iter().any(|a| a == "sqs:SendMessage"));
    }

    #[test]
    fn test_large_batches_get_a_batching_window() {
        let mut stack = stack_with_functions(&["worker"]);
        let mut p = props();
        p.consumers = vec!["worker".into()];
        p.batch_size = 100;
        stack.add(&QueueConstruct::new(p)).unwrap();
        let mapping = stack.resource("JobsWorkerEventSource").unwrap();
        assert_eq!(mapping.get("BatchSize").unwrap(), 100);
        assert_eq!(mapping.get("MaximumBatchingWindowInSeconds").unwrap(), 1);

        let mut stack = stack_with_functions(&["worker"]);
        let mut p = props();
        p.consumers = vec!["worker".into()];
        p.batch_size = 500;
        p.max_batching_window_secs = Some(20);
        stack.add(&QueueConstruct::new(p)).unwrap();
        let mapping = stack.resource("JobsWorkerEventSource").unwrap();
        assert_eq!(mapping.get("MaximumBatchingWindowInSeconds").unwrap(), 20);

        let mut p = props();
        p.batch_size = 100;
        p.max_batching_window_secs = Some(0);
        assert!(matches!(
            stack_with_functions(&[]).add(&QueueConstruct::new(p)),
            Err(ConstructError::Invalid { field: "max_batching_window_secs", .. })
        ));

        let mut p = props();
        p.fifo = true;
        p.max_batching_window_secs = Some(5);
        assert!(matches!(
            stack_with_functions(&[]).add(&QueueConstruct::new(p)),
            Err(ConstructError::Conflict { first: "max_batching_window_secs", .. })
        ));

        let mut p = props();
        p.max_batching_window_secs = Some(301);
        assert!(matches!(
            stack_with_functions(&[]).add(&QueueConstruct::new(p)),
            Err(ConstructError::Invalid { field: "max_batching_window_secs", .. })
        ));
    }

    #[test]
    fn test_fifo_name_suffix() {
        let mut stack = stack_with_functions(&[]);
        let mut p = props();
        p.fifo = true;
        p.queue_name = Some("orders".into());
        p.dead_letter_queue = Some(DeadLetterProps::default());
        stack.add(&QueueConstruct::new(p)).unwrap();
        assert_eq!(stack.resource("JobsQueue").unwrap().get("QueueName").unwrap(), "orders.fifo");
        assert_eq!(
            stack.resource("JobsDeadLetterQueue").unwrap().get("QueueName").unwrap(),
            "orders-dlq.fifo"
        );
    }

    #[test]
    fn test_dependencies() {
        let mut p = props();
        p.content_based_deduplication = true;
        assert_eq!(
            stack_with_functions(&[]).add(&QueueConstruct::new(p)).unwrap_err(),
            ConstructError::dependency("jobs", "content_based_deduplication", "fifo = true")
        );

        let mut p = props();
        p.queue_name = Some("orders.fifo".into());
        assert!(matches!(
            stack_with_functions(&[]).add(&QueueConstruct::new(p)),
            Err(ConstructError::Dependency { field: "queue_name", .. })
        ));
    }

    #[test]
    fn test_limits() {
        let mut p = props();
        p.fifo = true;
        p.batch_size = 11;
        assert!(matches!(
            stack_with_functions(&[]).add(&QueueConstruct::new(p)),
            Err(ConstructError::Invalid { field: "batch_size", .. })
        ));

        let mut p = props();
        p.retention_period_secs = 30;
        assert!(stack_with_functions(&[]).add(&QueueConstruct::new(p)).is_err());
    }
}
