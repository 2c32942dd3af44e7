// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::port::PortTemplate;
use indexmap::IndexMap;
use nodeweave_document::DocPath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node: its document path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub DocPath);

impl NodeId {
    /// Wrap a document path
    pub fn new(path: DocPath) -> Self {
        Self(path)
    }

    /// Document path of the node
    pub fn path(&self) -> &DocPath {
        &self.0
    }

    /// Node name (last path segment)
    pub fn name(&self) -> &str {
        self.0.name()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<DocPath> for NodeId {
    fn from(path: DocPath) -> Self {
        Self(path)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, readers)
    Input,
    /// Output nodes (terminals, surfaces)
    Output,
    /// Math operations
    Math,
    /// Texture operations
    Texture,
    /// Scene stream operations
    Scene,
    /// Shading models
    Shading,
    /// Utility nodes
    Utility,
}

impl NodeCategory {
    /// Display name used for menu grouping
    pub fn label(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::Math => "Math",
            Self::Texture => "Texture",
            Self::Scene => "Scene",
            Self::Shading => "Shading",
            Self::Utility => "Utility",
        }
    }
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeType {
    /// Unique type identifier; also the document type or shader id
    pub id: String,
    /// Display name, also the base for new node names
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Default input ports
    pub inputs: Vec<PortTemplate>,
    /// Default output ports
    pub outputs: Vec<PortTemplate>,
}

impl NodeType {
    /// All port templates, inputs first
    pub fn ports(&self) -> impl Iterator<Item = &PortTemplate> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// Registry of available node types
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Whether a type is registered
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A node of the current graph, as seen by the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Node id (document path)
    pub id: NodeId,
    /// Document type name
    pub type_name: String,
    /// Display name
    pub name: String,
    /// Whether the active catalog defines this type
    pub supported: bool,
    /// Bypass flag from the layout metadata
    pub bypassed: bool,
    /// Position in graph space
    pub position: [f32; 2],
    /// Transparent container this node is shown through, if any
    pub group: Option<NodeId>,
}
