//! Content delivery subsystem.
//!
//! # Data Flow
//! ```text
//! backend_url ──→ origin.rs ──────────────┐
//! bypass_paths + spa_origins              │
//!     → path_routing.rs (behaviors,       │
//!       rewrite table)                    ▼
//!     → edge_function.rs (viewer-request JS) → distribution.rs
//!                                              (origins, OAC, bucket
//!                                               policies, aliases)
//! ```
//!
//! # Design Decisions
//! - Rewrite decisions are computed in Rust by [`RewriteTable::resolve`] and
//!   by the generated JS from the same serialized table
//! - Duplicate path patterns fail synthesis instead of shadowing each other
//! - The SSR site reuses the distribution wiring with its function URL as
//!   the default origin

pub mod distribution;
pub mod edge_function;
pub mod origin;
pub mod path_routing;
pub mod ssr_site;

pub use distribution::{DistributionConstruct, DistributionProps, EdgeProps};
pub use edge_function::render_rewrite_function;
pub use origin::{parse_origin, OriginTarget};
pub use path_routing::{
    compile_routing, pattern_prefix, RewriteEntry, RewriteMode, RewriteTable, RoutingPlan,
    SpaOriginConfig,
};
pub use ssr_site::{SsrSiteConstruct, SsrSiteProps};
