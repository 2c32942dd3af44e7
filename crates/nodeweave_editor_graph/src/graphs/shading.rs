// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shading network graph for material authoring.
//!
//! Every shader is a `Shader` node whose `info:id` property names its
//! definition in the shader catalog. Node graphs group shaders and can be
//! entered like subgraphs.

use super::{GraphKind, GraphPolicy, BACKDROP_TYPE};
use crate::node::{NodeCategory, NodeRegistry, NodeType};
use crate::port::{PortTemplate, PortType};
use nodeweave_document::{DocumentNode, PropertyValue};

/// Document type of shader nodes
pub const SHADER_TYPE: &str = "Shader";
/// Shader grouping container
pub const NODE_GRAPH_TYPE: &str = "NodeGraph";
/// Material container, the usual root of a shading graph
pub const MATERIAL_TYPE: &str = super::procedural::MATERIAL_TYPE;
/// Property holding the shader definition id
pub const SHADER_ID_PROPERTY: &str = "info:id";

/// Shader id authored on a shader node
pub fn shader_id(node: &DocumentNode) -> Option<&str> {
    node.property(SHADER_ID_PROPERTY)
        .and_then(|property| property.value.as_ref())
        .and_then(PropertyValue::as_str)
}

/// Create the shader registry with all available shader definitions
pub fn create_shading_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Surfaces
    // ========================================================================

    registry.register(NodeType {
        id: "PreviewSurface".to_string(),
        name: "PreviewSurface".to_string(),
        category: NodeCategory::Shading,
        description: "Physically based preview surface".to_string(),
        inputs: vec![
            PortTemplate::input("diffuseColor", PortType::Color)
                .with_default(PropertyValue::Color([0.18, 0.18, 0.18, 1.0])),
            PortTemplate::input("metallic", PortType::Float).with_default(PropertyValue::Float(0.0)),
            PortTemplate::input("roughness", PortType::Float).with_default(PropertyValue::Float(0.5)),
            PortTemplate::input("normal", PortType::Vector3),
            PortTemplate::input("emissiveColor", PortType::Color)
                .with_default(PropertyValue::Color([0.0, 0.0, 0.0, 1.0])),
            PortTemplate::input("opacity", PortType::Float).with_default(PropertyValue::Float(1.0)),
        ],
        outputs: vec![
            PortTemplate::output("surface", PortType::Surface),
            PortTemplate::output("displacement", PortType::Float),
        ],
    });

    registry.register(NodeType {
        id: "UnlitSurface".to_string(),
        name: "UnlitSurface".to_string(),
        category: NodeCategory::Shading,
        description: "Surface without lighting".to_string(),
        inputs: vec![
            PortTemplate::input("color", PortType::Color)
                .with_default(PropertyValue::Color([1.0, 1.0, 1.0, 1.0])),
            PortTemplate::input("opacity", PortType::Float).with_default(PropertyValue::Float(1.0)),
        ],
        outputs: vec![PortTemplate::output("surface", PortType::Surface)],
    });

    // ========================================================================
    // Textures
    // ========================================================================

    registry.register(NodeType {
        id: "UVTexture".to_string(),
        name: "UVTexture".to_string(),
        category: NodeCategory::Texture,
        description: "Samples a texture at the given coordinates".to_string(),
        inputs: vec![
            PortTemplate::input("file", PortType::Texture),
            PortTemplate::input("st", PortType::Vector2),
            PortTemplate::input("scale", PortType::Vector4),
            PortTemplate::input("bias", PortType::Vector4),
        ],
        outputs: vec![
            PortTemplate::output("rgb", PortType::Color),
            PortTemplate::output("r", PortType::Float),
            PortTemplate::output("g", PortType::Float),
            PortTemplate::output("b", PortType::Float),
            PortTemplate::output("a", PortType::Float),
        ],
    });

    // ========================================================================
    // Inputs & Utilities
    // ========================================================================

    registry.register(NodeType {
        id: "PrimvarReader_float2".to_string(),
        name: "PrimvarReader".to_string(),
        category: NodeCategory::Input,
        description: "Reads a 2D primvar such as texture coordinates".to_string(),
        inputs: vec![
            PortTemplate::input("varname", PortType::Token)
                .with_default(PropertyValue::Token("st".to_string())),
        ],
        outputs: vec![PortTemplate::output("result", PortType::Vector2)],
    });

    registry.register(NodeType {
        id: "Transform2d".to_string(),
        name: "Transform2d".to_string(),
        category: NodeCategory::Utility,
        description: "Rotates, scales and offsets 2D coordinates".to_string(),
        inputs: vec![
            PortTemplate::input("in", PortType::Vector2),
            PortTemplate::input("rotation", PortType::Float).with_default(PropertyValue::Float(0.0)),
            PortTemplate::input("scale", PortType::Vector2)
                .with_default(PropertyValue::Vector2([1.0, 1.0])),
            PortTemplate::input("translation", PortType::Vector2)
                .with_default(PropertyValue::Vector2([0.0, 0.0])),
        ],
        outputs: vec![PortTemplate::output("result", PortType::Vector2)],
    });

    registry.register(NodeType {
        id: "ConstantColor".to_string(),
        name: "ConstantColor".to_string(),
        category: NodeCategory::Input,
        description: "Constant color value".to_string(),
        inputs: vec![
            PortTemplate::input("value", PortType::Color)
                .with_default(PropertyValue::Color([1.0, 1.0, 1.0, 1.0])),
        ],
        outputs: vec![PortTemplate::output("out", PortType::Color)],
    });

    registry
}

/// Rules of the shading graph
pub struct ShadingPolicy {
    catalog: NodeRegistry,
}

impl ShadingPolicy {
    /// Create the policy with the default shader catalog
    pub fn new() -> Self {
        Self {
            catalog: create_shading_registry(),
        }
    }
}

impl Default for ShadingPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphPolicy for ShadingPolicy {
    fn kind(&self) -> GraphKind {
        GraphKind::Shading
    }

    fn catalog(&self) -> &NodeRegistry {
        &self.catalog
    }

    fn can_be_root(&self, node: &DocumentNode) -> bool {
        matches!(node.type_name.as_str(), MATERIAL_TYPE | NODE_GRAPH_TYPE)
    }

    fn supports_type(&self, type_name: &str) -> bool {
        matches!(type_name, SHADER_TYPE | NODE_GRAPH_TYPE | BACKDROP_TYPE)
    }

    fn is_navigable(&self, type_name: &str) -> bool {
        type_name == NODE_GRAPH_TYPE
    }

    fn supports_bypass(&self) -> bool {
        false
    }

    fn catalog_type(&self, node: &DocumentNode) -> Option<&NodeType> {
        if node.type_name != SHADER_TYPE {
            return None;
        }
        shader_id(node).and_then(|id| self.catalog.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeweave_document::{DocPath, Property};

    fn shader(path: &str, id: &str) -> DocumentNode {
        let mut node = DocumentNode::new(DocPath::parse(path).unwrap(), SHADER_TYPE);
        node.properties.insert(
            SHADER_ID_PROPERTY.to_string(),
            Property::new(SHADER_ID_PROPERTY, "token").with_value(PropertyValue::Token(id.to_string())),
        );
        node
    }

    #[test]
    fn test_catalog_type_uses_shader_id() {
        let policy = ShadingPolicy::new();
        let node = shader("/Graph1/Material1/Surface", "PreviewSurface");
        assert_eq!(shader_id(&node), Some("PreviewSurface"));
        assert_eq!(policy.catalog_type(&node).map(|t| t.id.as_str()), Some("PreviewSurface"));

        let unknown = shader("/Graph1/Material1/Custom", "MyShader");
        assert!(policy.accepts(&unknown));
        assert!(policy.catalog_type(&unknown).is_none());
    }

    #[test]
    fn test_policy_predicates() {
        let policy = ShadingPolicy::new();
        let material = DocumentNode::new(DocPath::parse("/Graph1/Material1").unwrap(), MATERIAL_TYPE);
        assert!(policy.can_be_root(&material));
        assert!(!policy.accepts(&material));
        assert!(policy.is_navigable(NODE_GRAPH_TYPE));
        assert!(!policy.supports_bypass());
        assert!(!policy.ports_compatible(&PortType::Surface, &PortType::Float));
        assert!(policy.ports_compatible(&PortType::Color, &PortType::Color));
    }
}
