//! Synthesis subsystem.
//!
//! # Data Flow
//! ```text
//! StackContext (name, region, account)
//!     → Stack::new
//!     → Stack::add(construct) for each construct, in declaration order
//!         → construct validates props (fail fast, ConstructError)
//!         → resources, outputs, references registered on the Stack
//!     → Stack::into_template
//!     → Template (ordered maps, serialized as JSON)
//! ```
//!
//! # Design Decisions
//! - One synchronous pass; nothing here performs I/O
//! - Context is passed explicitly, never looked up from an enclosing scope
//! - BTreeMap everywhere so output is byte-stable for identical input
//! - References to other constructs resolve only to constructs added earlier

pub mod context;
pub mod error;
pub mod iam;
pub mod intrinsics;
pub mod stack;
pub mod template;

pub use context::StackContext;
pub use error::{ConstructError, ConstructResult};
pub use stack::{logical_id, CertificateRef, Construct, Stack, WebAclRef};
pub use template::{Output, RemovalPolicy, Resource, Template};

/// Synthesize a list of constructs into a template.
pub fn synthesize(
    context: StackContext,
    description: Option<&str>,
    constructs: &[&dyn Construct],
) -> ConstructResult<Template> {
    let mut stack = Stack::new(context);
    if let Some(description) = description {
        stack.set_description(description);
    }
    for construct in constructs {
        stack.add(*construct)?;
    }
    let template = stack.into_template();
    tracing::info!(
        resources = template.resources.len(),
        outputs = template.outputs.len(),
        "Synthesis complete"
    );
    Ok(template)
}
