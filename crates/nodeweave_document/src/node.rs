// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document nodes, properties and layout metadata.

use crate::path::{DocPath, PropertyPath};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Namespace of properties that receive connections
pub const INPUTS_NAMESPACE: &str = "inputs";
/// Namespace of properties that provide connections
pub const OUTPUTS_NAMESPACE: &str = "outputs";

/// Authored value of a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// 2D vector
    Vector2([f64; 2]),
    /// 3D vector
    Vector3([f64; 3]),
    /// RGBA color
    Color([f32; 4]),
    /// Free-form string
    String(String),
    /// Interned identifier, e.g. a shader id
    Token(String),
}

impl PropertyValue {
    /// Token or string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Token(s) => Some(s),
            _ => None,
        }
    }
}

/// A named, typed property of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Full name including namespace, e.g. `inputs:a`
    pub name: String,
    /// Type name, e.g. `float` or `color3f`
    pub type_name: String,
    /// Authored value
    #[serde(default)]
    pub value: Option<PropertyValue>,
    /// Connection sources, authored on the receiving side
    #[serde(default)]
    pub connections: Vec<PropertyPath>,
}

impl Property {
    /// Create a property without value or connections
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: None,
            connections: Vec::new(),
        }
    }

    /// Set the authored value
    pub fn with_value(mut self, value: PropertyValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Namespace prefix, e.g. `inputs` for `inputs:a`
    pub fn namespace(&self) -> Option<&str> {
        self.name.split_once(':').map(|(namespace, _)| namespace)
    }

    /// Name without namespace
    pub fn base_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, base)| base)
    }
}

/// Editor layout data stored alongside a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeMetadata {
    /// Position in graph space
    pub position: [f32; 2],
    /// Whether the node is bypassed during evaluation
    pub bypass: bool,
    /// Custom header color
    pub display_color: Option<[u8; 3]>,
}

/// A node of the hierarchical document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    /// Absolute path
    pub path: DocPath,
    /// Schema type name, e.g. `Graph` or `Shader`
    pub type_name: String,
    /// Properties in authoring order
    #[serde(default)]
    pub properties: IndexMap<String, Property>,
    /// Child names in authoring order
    #[serde(default)]
    pub children: Vec<String>,
    /// Layout metadata
    #[serde(default)]
    pub metadata: NodeMetadata,
}

impl DocumentNode {
    /// Create a node with no properties or children
    pub fn new(path: DocPath, type_name: impl Into<String>) -> Self {
        Self {
            path,
            type_name: type_name.into(),
            properties: IndexMap::new(),
            children: Vec::new(),
            metadata: NodeMetadata::default(),
        }
    }

    /// Node name (last path segment)
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Look up a property by full name
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Whether a child with `name` exists
    pub fn has_child(&self, name: &str) -> bool {
        self.children.iter().any(|child| child == name)
    }
}
