//! App file configuration.
//!
//! # Data Flow
//! ```text
//! app file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks across constructs)
//!     → AppConfig (validated, immutable)
//!     → AppConfig::synthesize → Template
//!
//! With --watch:
//!     watcher.rs detects change
//!     → loader.rs loads and synthesizes again
//!     → new template sent to the CLI, old one kept on failure
//! ```
//!
//! # Design Decisions
//! - Constructs are a tagged list; order matters for references
//! - All props have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, synthesize_file, ConfigError};
pub use schema::{AppConfig, ConstructConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
