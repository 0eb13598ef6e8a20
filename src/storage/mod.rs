//! Stateful resources: tables, queues and secrets.
//!
//! Each construct binds its physical name or URL into the functions that use
//! it and grants the matching IAM actions through [`crate::compute::FunctionHandle`].

pub mod queue;
pub mod rate_limit_table;
pub mod secret;
pub mod table;

pub use queue::{QueueConstruct, QueueProps};
pub use rate_limit_table::{RateLimitTableConstruct, RateLimitTableProps, RATE_LIMIT_TABLE_ENV};
pub use secret::{SecretConstruct, SecretProps};
pub use table::{TableConstruct, TableProps, TABLE_ENV};
