//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! constructs and config
//!     → tracing events (construct, logical_id, kind fields)
//!     → logging.rs subscriber (stderr, pretty or JSON)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - stderr only, so stdout can carry the template

pub mod logging;

pub use logging::{init_logging, LogFormat};
