//! Compute subsystem.
//!
//! # Data Flow
//! ```text
//! FunctionProps
//!     → function.rs (role, log group, function, optional URL)
//!     → FunctionHandle registered on the Stack
//!     → later constructs: bind_environment / grant
//! ```

pub mod function;

pub use function::{FunctionConstruct, FunctionHandle, FunctionProps};
