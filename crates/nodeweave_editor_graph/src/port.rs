// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.
//!
//! Ports are derived from document properties. The property namespace
//! decides the direction (`inputs:` or `outputs:`), the property type name
//! decides the [`PortType`].

use crate::node::NodeId;
use nodeweave_document::node::{INPUTS_NAMESPACE, OUTPUTS_NAMESPACE};
use nodeweave_document::{Property, PropertyPath, PropertyValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
    /// Property outside the `inputs`/`outputs` namespaces
    Unknown,
}

impl PortDirection {
    /// Direction implied by a property name
    pub fn from_property_name(name: &str) -> Self {
        match name.split_once(':') {
            Some((INPUTS_NAMESPACE, _)) => Self::Input,
            Some((OUTPUTS_NAMESPACE, _)) => Self::Output,
            _ => Self::Unknown,
        }
    }

    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::Unknown => "Unknown",
        }
    }
}

/// Identifier of a port: owning node, property name and direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId {
    /// Owning node
    pub node: NodeId,
    /// Full property name, e.g. `inputs:a`
    pub property: String,
    /// Direction derived from the property namespace
    pub direction: PortDirection,
}

impl PortId {
    /// Build the id of the port backed by `property` on `node`
    pub fn new(node: NodeId, property: impl Into<String>) -> Self {
        let property = property.into();
        let direction = PortDirection::from_property_name(&property);
        Self {
            node,
            property,
            direction,
        }
    }

    /// Document path of the backing property
    pub fn property_path(&self) -> PropertyPath {
        PropertyPath::new(self.node.path().clone(), self.property.clone())
    }

    /// Property name without namespace
    pub fn short_name(&self) -> &str {
        self.property
            .split_once(':')
            .map_or(self.property.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.property)
    }
}

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color
    Color,
    /// Texture asset
    Texture,
    /// Shading network output
    Surface,
    /// Scene description stream
    Scene,
    /// String value
    String,
    /// Interned identifier
    Token,
    /// Any type (for generic nodes)
    Any,
    /// Custom type
    Custom(String),
}

impl PortType {
    /// Map a document type name onto a port type
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "bool" => Self::Bool,
            "int" | "int64" => Self::Int,
            "float" | "double" | "half" => Self::Float,
            "float2" | "texCoord2f" => Self::Vector2,
            "float3" | "vector3f" | "normal3f" | "point3f" => Self::Vector3,
            "float4" => Self::Vector4,
            "color3f" | "color4f" => Self::Color,
            "asset" => Self::Texture,
            "token" => Self::Token,
            "string" => Self::String,
            "surface" | "terminal" => Self::Surface,
            "scene" => Self::Scene,
            "any" | "" => Self::Any,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Canonical document type name
    pub fn type_name(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Vector2 => "float2",
            Self::Vector3 => "float3",
            Self::Vector4 => "float4",
            Self::Color => "color3f",
            Self::Texture => "asset",
            Self::Surface => "surface",
            Self::Scene => "scene",
            Self::String => "string",
            Self::Token => "token",
            Self::Any => "any",
            Self::Custom(name) => name,
        }
    }

    /// Get the color for this port type (for UI)
    pub fn color(&self) -> [u8; 3] {
        match self {
            Self::Bool => [200, 80, 80],
            Self::Int => [80, 200, 200],
            Self::Float => [80, 200, 80],
            Self::Vector2 => [200, 200, 80],
            Self::Vector3 => [200, 150, 80],
            Self::Vector4 => [200, 100, 200],
            Self::Color => [255, 200, 100],
            Self::Texture => [100, 150, 200],
            Self::Surface => [200, 100, 150],
            Self::Scene => [150, 200, 150],
            Self::String | Self::Token => [200, 180, 150],
            Self::Any => [150, 150, 150],
            Self::Custom(_) => [128, 128, 128],
        }
    }

    /// Check if an output of this type can feed an input of `other`
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }
        if self == other {
            return true;
        }

        // Implicit conversions
        match (self, other) {
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            (Self::Float, Self::Vector2 | Self::Vector3 | Self::Vector4) => true,
            (Self::Vector2, Self::Vector3 | Self::Vector4) => true,
            (Self::Vector3, Self::Vector4 | Self::Color) => true,
            (Self::Color, Self::Vector3 | Self::Vector4) | (Self::Vector4, Self::Color) => true,
            (Self::Token, Self::String) | (Self::String, Self::Token) => true,
            _ => false,
        }
    }
}

/// Port definition in a node type catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortTemplate {
    /// Full property name including namespace
    pub name: String,
    /// Data type
    pub port_type: PortType,
    /// Value authored when the port is created
    pub default_value: Option<PropertyValue>,
}

impl PortTemplate {
    /// Create an input port definition
    pub fn input(name: &str, port_type: PortType) -> Self {
        Self {
            name: format!("{INPUTS_NAMESPACE}:{name}"),
            port_type,
            default_value: None,
        }
    }

    /// Create an output port definition
    pub fn output(name: &str, port_type: PortType) -> Self {
        Self {
            name: format!("{OUTPUTS_NAMESPACE}:{name}"),
            port_type,
            default_value: None,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: PropertyValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Document property authored for this port
    pub fn to_property(&self) -> Property {
        let property = Property::new(self.name.clone(), self.port_type.type_name());
        match &self.default_value {
            Some(value) => property.with_value(value.clone()),
            None => property,
        }
    }
}

/// A materialized port of a node in the current graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Port id
    pub id: PortId,
    /// Data type
    pub port_type: PortType,
    /// Whether multiple connections are allowed
    pub multi_connect: bool,
}

impl PortDescriptor {
    /// Describe the port backed by `property`
    pub fn from_property(node: NodeId, property: &Property, port_type: PortType) -> Self {
        let id = PortId::new(node, property.name.clone());
        let multi_connect = id.direction != PortDirection::Input;
        Self {
            id,
            port_type,
            multi_connect,
        }
    }

    /// Port direction
    pub fn direction(&self) -> PortDirection {
        self.id.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeweave_document::DocPath;

    fn node(path: &str) -> NodeId {
        NodeId::new(DocPath::parse(path).unwrap())
    }

    #[test]
    fn test_direction_from_namespace() {
        assert_eq!(PortDirection::from_property_name("inputs:a"), PortDirection::Input);
        assert_eq!(PortDirection::from_property_name("outputs:out"), PortDirection::Output);
        assert_eq!(PortDirection::from_property_name("info:id"), PortDirection::Unknown);
        assert_eq!(PortDirection::from_property_name("visibility"), PortDirection::Unknown);
    }

    #[test]
    fn test_port_id_is_unique_per_property() {
        let a = PortId::new(node("/Graph1/Add1"), "inputs:a");
        let b = PortId::new(node("/Graph1/Add1"), "inputs:b");
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "/Graph1/Add1.inputs:a");
        assert_eq!(a.short_name(), "a");
        assert_eq!(a.property_path().to_string(), "/Graph1/Add1.inputs:a");
    }

    #[test]
    fn test_type_compatibility() {
        assert!(PortType::Float.can_connect_to(&PortType::Vector3));
        assert!(PortType::Color.can_connect_to(&PortType::Vector4));
        assert!(PortType::Any.can_connect_to(&PortType::Surface));
        assert!(!PortType::Surface.can_connect_to(&PortType::Float));
        assert!(!PortType::Vector3.can_connect_to(&PortType::Float));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(PortType::from_type_name("color3f"), PortType::Color);
        assert_eq!(PortType::from_type_name("matrix4d"), PortType::Custom("matrix4d".into()));
        assert_eq!(PortType::from_type_name(PortType::Vector2.type_name()), PortType::Vector2);
    }

    #[test]
    fn test_template_to_property() {
        let template = PortTemplate::input("scale", PortType::Float).with_default(PropertyValue::Float(1.0));
        let property = template.to_property();
        assert_eq!(property.name, "inputs:scale");
        assert_eq!(property.type_name, "float");
        assert_eq!(property.value, Some(PropertyValue::Float(1.0)));

        let descriptor = PortDescriptor::from_property(node("/G/A"), &property, template.port_type);
        assert_eq!(descriptor.direction(), PortDirection::Input);
        assert!(!descriptor.multi_connect);
    }
}
