//! AppTheory infrastructure constructs.
//!
//! Typed construct props synthesize into a CloudFormation template:
//!
//! ```text
//! app file (TOML) ──▶ config ──▶ Stack ──▶ Template (JSON)
//!                                  ▲
//!     compute · storage · network · dns · waf · cdn · api
//! ```
//!
//! The pure helpers at the core (relative record names, WAF rule lists, CDN
//! path routing, origin parsing) are usable on their own.

pub mod api;
pub mod cdn;
pub mod compute;
pub mod config;
pub mod dns;
pub mod network;
pub mod observability;
pub mod storage;
pub mod synth;
pub mod waf;

pub use config::{AppConfig, ConfigError};
pub use synth::{Construct, ConstructError, ConstructResult, Stack, StackContext, Template};
