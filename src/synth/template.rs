//! Declarative template document.
//!
//! The serialized form follows the CloudFormation JSON layout. All maps are
//! ordered so that identical input always produces byte-identical output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Template format version emitted in every document.
pub const FORMAT_VERSION: &str = "2010-09-09";

/// Root synthesized document.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,

    #[serde(rename = "Resources", default)]
    pub resources: BTreeMap<String, Resource>,

    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, Output>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }
}

impl Template {
    /// Resources of the given type, in logical-id order.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize as compact JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Retention behavior when a resource leaves the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

/// A single resource declaration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(rename = "Properties", skip_serializing_if = "Map::is_empty", default)]
    pub properties: Map<String, Value>,

    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty", default)]
    pub depends_on: Vec<String>,

    #[serde(rename = "DeletionPolicy", skip_serializing_if = "Option::is_none", default)]
    pub deletion_policy: Option<DeletionPolicy>,

    #[serde(
        rename = "UpdateReplacePolicy",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub update_replace_policy: Option<DeletionPolicy>,
}

impl Resource {
    /// Create a resource from a type name and a JSON object of properties.
    ///
    /// Non-object property values are ignored.
    pub fn new(resource_type: impl Into<String>, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            resource_type: resource_type.into(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    /// Add an explicit ordering dependency.
    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let id = logical_id.into();
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
        self
    }

    /// Keep the physical resource when it is removed or replaced.
    pub fn retain(mut self) -> Self {
        self.deletion_policy = Some(DeletionPolicy::Retain);
        self.update_replace_policy = Some(DeletionPolicy::Retain);
        self
    }

    /// Apply a removal policy chosen by the operator.
    pub fn with_removal_policy(self, policy: RemovalPolicy) -> Self {
        match policy {
            RemovalPolicy::Retain => self.retain(),
            RemovalPolicy::Destroy => self,
        }
    }

    /// Set a property, replacing any previous value.
    pub fn set(&mut self, key: &str, value: Value) {
        self.properties.insert(key.to_string(), value);
    }

    /// Read a property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Operator-facing removal policy for stateful resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    #[default]
    Retain,
    Destroy,
}

/// A named stack output.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Output {
    #[serde(rename = "Value")]
    pub value: Value,

    #[serde(rename = "Description", skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,

    #[serde(rename = "Export", skip_serializing_if = "Option::is_none", default)]
    pub export: Option<Export>,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
            export: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn export(mut self, name: impl Into<String>) -> Self {
        self.export = Some(Export { name: name.into() });
        self
    }
}

/// Cross-stack export name of an output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Export {
    #[serde(rename = "Name")]
    pub name: String,
}
