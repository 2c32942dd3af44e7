// SPDX-License-Identifier: MIT OR Apache-2.0
//! Procedural scene graph: operator nodes wired into a scene stream.
//!
//! Graphs and groups are containers that can be edited and entered.
//! Scopes are transparent: their children are shown in the parent graph.
//! Materials appear as nodes and are edited with the shading graph.

use super::{GraphKind, GraphPolicy, BACKDROP_TYPE};
use crate::node::{NodeCategory, NodeRegistry, NodeType};
use crate::port::{PortTemplate, PortType};
use nodeweave_document::{DocumentNode, PropertyValue};

/// Top level procedural container
pub const GRAPH_TYPE: &str = "Graph";
/// Nested procedural container
pub const GROUP_TYPE: &str = "Group";
/// Transparent organizational container
pub const SCOPE_TYPE: &str = "Scope";
/// Material node, edited in a shading graph
pub const MATERIAL_TYPE: &str = "Material";

/// Create the procedural node registry with all available operators
pub fn create_procedural_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Input Nodes
    // ========================================================================

    registry.register(NodeType {
        id: "SceneReader".to_string(),
        name: "SceneReader".to_string(),
        category: NodeCategory::Input,
        description: "Reads a scene description file into the stream".to_string(),
        inputs: vec![PortTemplate::input("file", PortType::Texture)],
        outputs: vec![PortTemplate::output("out", PortType::Scene)],
    });

    registry.register(NodeType {
        id: "Constant".to_string(),
        name: "Constant".to_string(),
        category: NodeCategory::Input,
        description: "Constant float value".to_string(),
        inputs: vec![
            PortTemplate::input("value", PortType::Float).with_default(PropertyValue::Float(0.0)),
        ],
        outputs: vec![PortTemplate::output("out", PortType::Float)],
    });

    // ========================================================================
    // Math Nodes
    // ========================================================================

    registry.register(NodeType {
        id: "Add".to_string(),
        name: "Add".to_string(),
        category: NodeCategory::Math,
        description: "Adds two values".to_string(),
        inputs: vec![
            PortTemplate::input("a", PortType::Float).with_default(PropertyValue::Float(0.0)),
            PortTemplate::input("b", PortType::Float).with_default(PropertyValue::Float(0.0)),
        ],
        outputs: vec![PortTemplate::output("out", PortType::Float)],
    });

    registry.register(NodeType {
        id: "Multiply".to_string(),
        name: "Multiply".to_string(),
        category: NodeCategory::Math,
        description: "Multiplies two values".to_string(),
        inputs: vec![
            PortTemplate::input("a", PortType::Float).with_default(PropertyValue::Float(1.0)),
            PortTemplate::input("b", PortType::Float).with_default(PropertyValue::Float(1.0)),
        ],
        outputs: vec![PortTemplate::output("out", PortType::Float)],
    });

    // ========================================================================
    // Scene Operators
    // ========================================================================

    registry.register(NodeType {
        id: "Merge".to_string(),
        name: "Merge".to_string(),
        category: NodeCategory::Scene,
        description: "Merges two scene streams".to_string(),
        inputs: vec![
            PortTemplate::input("in0", PortType::Scene),
            PortTemplate::input("in1", PortType::Scene),
        ],
        outputs: vec![PortTemplate::output("out", PortType::Scene)],
    });

    registry.register(NodeType {
        id: "Prune".to_string(),
        name: "Prune".to_string(),
        category: NodeCategory::Scene,
        description: "Removes locations matching a path pattern".to_string(),
        inputs: vec![
            PortTemplate::input("in", PortType::Scene),
            PortTemplate::input("paths", PortType::String)
                .with_default(PropertyValue::String(String::new())),
        ],
        outputs: vec![PortTemplate::output("out", PortType::Scene)],
    });

    registry.register(NodeType {
        id: "Isolate".to_string(),
        name: "Isolate".to_string(),
        category: NodeCategory::Scene,
        description: "Keeps only locations matching a path pattern".to_string(),
        inputs: vec![
            PortTemplate::input("in", PortType::Scene),
            PortTemplate::input("paths", PortType::String)
                .with_default(PropertyValue::String(String::new())),
        ],
        outputs: vec![PortTemplate::output("out", PortType::Scene)],
    });

    registry.register(NodeType {
        id: "Transform".to_string(),
        name: "Transform".to_string(),
        category: NodeCategory::Scene,
        description: "Applies a translation to matching locations".to_string(),
        inputs: vec![
            PortTemplate::input("in", PortType::Scene),
            PortTemplate::input("translate", PortType::Vector3)
                .with_default(PropertyValue::Vector3([0.0, 0.0, 0.0])),
        ],
        outputs: vec![PortTemplate::output("out", PortType::Scene)],
    });

    // ========================================================================
    // Utility / Output
    // ========================================================================

    registry.register(NodeType {
        id: "Switch".to_string(),
        name: "Switch".to_string(),
        category: NodeCategory::Utility,
        description: "Selects one of two scene streams".to_string(),
        inputs: vec![
            PortTemplate::input("in0", PortType::Scene),
            PortTemplate::input("in1", PortType::Scene),
            PortTemplate::input("index", PortType::Int).with_default(PropertyValue::Int(0)),
        ],
        outputs: vec![PortTemplate::output("out", PortType::Scene)],
    });

    registry.register(NodeType {
        id: "Render".to_string(),
        name: "Render".to_string(),
        category: NodeCategory::Output,
        description: "Scene stream handed to the renderer".to_string(),
        inputs: vec![PortTemplate::input("in", PortType::Scene)],
        outputs: vec![],
    });

    registry
}

/// Rules of the procedural graph
pub struct ProceduralPolicy {
    catalog: NodeRegistry,
}

impl ProceduralPolicy {
    /// Create the policy with the default operator catalog
    pub fn new() -> Self {
        Self {
            catalog: create_procedural_registry(),
        }
    }
}

impl Default for ProceduralPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphPolicy for ProceduralPolicy {
    fn kind(&self) -> GraphKind {
        GraphKind::Procedural
    }

    fn catalog(&self) -> &NodeRegistry {
        &self.catalog
    }

    fn can_be_root(&self, node: &DocumentNode) -> bool {
        matches!(node.type_name.as_str(), GRAPH_TYPE | GROUP_TYPE)
    }

    fn supports_type(&self, type_name: &str) -> bool {
        self.catalog.contains(type_name)
            || matches!(type_name, GRAPH_TYPE | GROUP_TYPE | MATERIAL_TYPE | BACKDROP_TYPE)
    }

    fn is_transparent(&self, node: &DocumentNode) -> bool {
        node.type_name == SCOPE_TYPE
    }

    fn is_navigable(&self, type_name: &str) -> bool {
        matches!(type_name, GRAPH_TYPE | GROUP_TYPE)
    }

    fn supports_bypass(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeweave_document::DocPath;

    fn doc_node(path: &str, type_name: &str) -> DocumentNode {
        DocumentNode::new(DocPath::parse(path).unwrap(), type_name)
    }

    #[test]
    fn test_registry_contents() {
        let registry = create_procedural_registry();
        assert!(registry.get("Add").is_some());
        assert!(registry.types_in_category(NodeCategory::Scene).count() >= 4);
        for node_type in registry.types() {
            assert!(
                nodeweave_document::is_valid_name(&node_type.name),
                "{} must be usable as a node name",
                node_type.name
            );
        }
    }

    #[test]
    fn test_policy_predicates() {
        let policy = ProceduralPolicy::new();
        assert!(policy.can_be_root(&doc_node("/Graph1", GRAPH_TYPE)));
        assert!(policy.can_be_root(&doc_node("/Graph1/Group1", GROUP_TYPE)));
        assert!(!policy.can_be_root(&doc_node("/Graph1/Material1", MATERIAL_TYPE)));

        assert!(policy.accepts(&doc_node("/Graph1/Add1", "Add")));
        assert!(policy.accepts(&doc_node("/Graph1/Material1", MATERIAL_TYPE)));
        assert!(!policy.accepts(&doc_node("/Graph1/Mesh", "Mesh")));
        assert!(!policy.accepts(&doc_node("/Graph1/Scope1", SCOPE_TYPE)));
        assert!(policy.is_transparent(&doc_node("/Graph1/Scope1", SCOPE_TYPE)));

        assert!(policy.is_navigable(GROUP_TYPE));
        assert!(!policy.is_navigable("Add"));
        assert!(policy.supports_bypass());
    }
}
