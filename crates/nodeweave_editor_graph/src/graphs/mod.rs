// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph kinds built on the core framework.
//!
//! A [`GraphPolicy`] decides which document nodes a graph kind shows, which
//! containers it can be rooted at and navigated into, how ports are typed
//! and which optional operations (bypass, terminal node) it supports.

pub mod procedural;
pub mod shading;

use crate::node::{NodeRegistry, NodeType};
use crate::port::PortType;
use nodeweave_document::{DocumentNode, Property};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Visual annotation node type shared by every graph kind
pub const BACKDROP_TYPE: &str = "Backdrop";

/// Kind of graph being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphKind {
    /// Generic procedural graph
    Procedural,
    /// Shading network inside a material
    Shading,
}

impl GraphKind {
    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Procedural => "Procedural",
            Self::Shading => "Shading",
        }
    }

    /// Policy implementing this kind
    pub fn policy(&self) -> Rc<dyn GraphPolicy> {
        match self {
            Self::Procedural => Rc::new(procedural::ProceduralPolicy::new()),
            Self::Shading => Rc::new(shading::ShadingPolicy::new()),
        }
    }
}

/// Per-kind rules consulted by the model and the item registry
pub trait GraphPolicy {
    /// Kind implemented by this policy
    fn kind(&self) -> GraphKind;

    /// Node types offered for creation
    fn catalog(&self) -> &NodeRegistry;

    /// Whether a node can be the root of this kind of graph
    fn can_be_root(&self, node: &DocumentNode) -> bool;

    /// Whether nodes of `type_name` may appear in the graph
    fn supports_type(&self, type_name: &str) -> bool;

    /// Support predicate: whether `node` is shown
    fn accepts(&self, node: &DocumentNode) -> bool {
        self.supports_type(&node.type_name)
    }

    /// Whether `node` is a transparent container whose children are shown
    /// in its place
    fn is_transparent(&self, _node: &DocumentNode) -> bool {
        false
    }

    /// Whether nodes of `type_name` can be entered as subgraphs
    fn is_navigable(&self, type_name: &str) -> bool;

    /// Whether nodes can be bypassed
    fn supports_bypass(&self) -> bool;

    /// Whether a terminal node can be designated
    fn supports_terminal(&self) -> bool {
        true
    }

    /// Catalog definition matching `node`
    fn catalog_type(&self, node: &DocumentNode) -> Option<&NodeType> {
        self.catalog().get(&node.type_name)
    }

    /// Data type of the port backed by `property`
    fn port_type(&self, property: &Property) -> PortType {
        PortType::from_type_name(&property.type_name)
    }

    /// Whether an output of type `output` may feed an input of type `input`
    fn ports_compatible(&self, output: &PortType, input: &PortType) -> bool {
        output.can_connect_to(input)
    }
}
