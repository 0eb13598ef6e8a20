//! The in-memory stack every construct writes into.
//!
//! # Responsibilities
//! - Own the template under construction
//! - Reject duplicate logical ids and outputs
//! - Register constructs other constructs may reference (functions,
//!   certificates, web ACLs)

use std::collections::BTreeMap;

use serde_json::Value;

use crate::compute::FunctionHandle;
use crate::synth::context::StackContext;
use crate::synth::error::{ConstructError, ConstructResult};
use crate::synth::template::{Output, Resource, Template};
use crate::waf::WafScope;

/// A unit of configuration that emits resources into a [`Stack`].
pub trait Construct: std::fmt::Debug {
    /// Construct id, unique within the stack.
    fn id(&self) -> &str;

    /// Short type name used in logs.
    fn kind(&self) -> &'static str;

    /// Validate props and add resources, outputs and references to the stack.
    fn synthesize(&self, stack: &mut Stack) -> ConstructResult<()>;
}

/// Reference to a certificate declared earlier in the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateRef {
    pub arn: Value,
    /// Region the certificate is issued in.
    pub region: String,
}

/// Reference to a web ACL declared earlier in the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct WebAclRef {
    pub arn: Value,
    pub scope: WafScope,
}

/// Synthesis target shared by all constructs of one app.
#[derive(Debug)]
pub struct Stack {
    context: StackContext,
    template: Template,
    functions: BTreeMap<String, FunctionHandle>,
    certificates: BTreeMap<String, CertificateRef>,
    web_acls: BTreeMap<String, WebAclRef>,
}

impl Stack {
    pub fn new(context: StackContext) -> Self {
        Self {
            context,
            template: Template::default(),
            functions: BTreeMap::new(),
            certificates: BTreeMap::new(),
            web_acls: BTreeMap::new(),
        }
    }

    pub fn context(&self) -> &StackContext {
        &self.context
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.template.description = Some(description.into());
    }

    /// Synthesize one construct into this stack.
    pub fn add(&mut self, construct: &dyn Construct) -> ConstructResult<()> {
        let before = self.template.resources.len();
        construct.synthesize(self)?;
        tracing::info!(
            construct = %construct.id(),
            kind = construct.kind(),
            resources = self.template.resources.len() - before,
            "Construct synthesized"
        );
        Ok(())
    }

    /// Add a resource under a logical id. Returns the id for chaining references.
    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> ConstructResult<String> {
        let logical_id = logical_id.into();
        if self.template.resources.contains_key(&logical_id) {
            return Err(ConstructError::DuplicateLogicalId(logical_id));
        }
        tracing::debug!(
            logical_id = %logical_id,
            resource_type = %resource.resource_type,
            "Adding resource"
        );
        self.template.resources.insert(logical_id.clone(), resource);
        Ok(logical_id)
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.template.resources.get(logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Option<&mut Resource> {
        self.template.resources.get_mut(logical_id)
    }

    pub fn add_output(&mut self, name: impl Into<String>, output: Output) -> ConstructResult<()> {
        let name = name.into();
        if self.template.outputs.contains_key(&name) {
            return Err(ConstructError::DuplicateOutput(name));
        }
        self.template.outputs.insert(name, output);
        Ok(())
    }

    /// Add an output exported as `{stack}-{name}`.
    pub fn add_exported_output(
        &mut self,
        name: impl Into<String>,
        value: Value,
        description: &str,
    ) -> ConstructResult<()> {
        let name = name.into();
        let export = format!("{}-{}", self.context.name, name);
        self.add_output(name, Output::new(value).description(description).export(export))
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn into_template(self) -> Template {
        self.template
    }

    // --- Cross-construct references ---

    pub fn register_function(&mut self, id: &str, handle: FunctionHandle) -> ConstructResult<()> {
        insert_unique(&mut self.functions, id, handle)
    }

    /// Look up a function declared earlier in the stack.
    pub fn function(&self, construct: &str, id: &str) -> ConstructResult<FunctionHandle> {
        lookup(&self.functions, construct, "function", id)
    }

    /// Look up every function in `ids`, preserving order.
    pub fn functions(
        &self,
        construct: &str,
        ids: &[String],
    ) -> ConstructResult<Vec<FunctionHandle>> {
        ids.iter().map(|id| self.function(construct, id)).collect()
    }

    pub fn register_certificate(&mut self, id: &str, cert: CertificateRef) -> ConstructResult<()> {
        insert_unique(&mut self.certificates, id, cert)
    }

    pub fn certificate(&self, construct: &str, id: &str) -> ConstructResult<CertificateRef> {
        lookup(&self.certificates, construct, "certificate", id)
    }

    pub fn register_web_acl(&mut self, id: &str, acl: WebAclRef) -> ConstructResult<()> {
        insert_unique(&mut self.web_acls, id, acl)
    }

    pub fn web_acl(&self, construct: &str, id: &str) -> ConstructResult<WebAclRef> {
        lookup(&self.web_acls, construct, "web ACL", id)
    }
}

fn insert_unique<T>(map: &mut BTreeMap<String, T>, id: &str, value: T) -> ConstructResult<()> {
    if map.contains_key(id) {
        return Err(ConstructError::invalid(id, "id", "already registered in this stack"));
    }
    map.insert(id.to_string(), value);
    Ok(())
}

fn lookup<T: Clone>(
    map: &BTreeMap<String, T>,
    construct: &str,
    kind: &'static str,
    id: &str,
) -> ConstructResult<T> {
    map.get(id).cloned().ok_or_else(|| ConstructError::UnknownReference {
        construct: construct.to_string(),
        kind,
        id: id.to_string(),
    })
}

/// Derive a logical id from a construct id and resource suffixes.
///
/// Non-alphanumeric characters split words; each word is capitalized.
/// `logical_id(&["orders-api", "Stage"])` → `OrdersApiStage`.
pub fn logical_id(parts: &[&str]) -> String {
    let mut id = String::new();
    for part in parts {
        let mut upper_next = true;
        for c in part.chars() {
            if c.is_ascii_alphanumeric() {
                if upper_next {
                    id.push(c.to_ascii_uppercase());
                    upper_next = false;
                } else {
                    id.push(c);
                }
            } else {
                upper_next = true;
            }
        }
    }
    if id.is_empty() || id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert(0, 'R');
    }
    id
}
