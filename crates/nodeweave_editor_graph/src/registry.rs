// SPDX-License-Identifier: MIT OR Apache-2.0
//! Item registry: turns model descriptors into visual items.
//!
//! Persistent items are tagged with a [`NodeItemKind`] chosen when they are
//! built. Live items are uncommitted placeholders held by the scene's
//! grabber while the user places a node or drags a connection; committing
//! one performs the document write through the model.

use crate::connection::ConnectionId;
use crate::error::{GraphError, Result, ValidationError};
use crate::graphs::procedural::MATERIAL_TYPE;
use crate::graphs::shading::{shader_id, SHADER_TYPE};
use crate::graphs::{GraphKind, GraphPolicy, BACKDROP_TYPE};
use crate::model::GraphModel;
use crate::node::{NodeDescriptor, NodeId};
use crate::port::{PortDirection, PortId, PortType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Identity of a registry instance, used to drop events from unbound registries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryToken(Uuid);

/// Visual item identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Create a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of node item, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeItemKind {
    /// Plain operator node
    Generic,
    /// Node that can be entered as a subgraph
    Container,
    /// Visual annotation frame
    Backdrop,
    /// Shader node
    Shader {
        /// Shader definition id
        shader_id: String,
    },
    /// Material, edited in the shading graph
    Material,
}

/// A port drawn on a node item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortItem {
    /// Port id
    pub id: PortId,
    /// Data type, for coloring
    pub port_type: PortType,
    /// Label (property name without namespace)
    pub label: String,
}

/// Visual item for a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeItem {
    /// Item id
    pub item_id: ItemId,
    /// Backing node
    pub node: NodeId,
    /// Item kind
    pub kind: NodeItemKind,
    /// Title shown in the header
    pub title: String,
    /// Document type name
    pub type_name: String,
    /// Position in graph space
    pub position: [f32; 2],
    /// Header color
    pub color: [u8; 3],
    /// Bypass flag
    pub bypassed: bool,
    /// Whether this is the terminal node
    pub is_terminal: bool,
    /// Selection state
    pub selected: bool,
    /// Input ports, in property order
    pub inputs: Vec<PortItem>,
    /// Output ports, in property order
    pub outputs: Vec<PortItem>,
}

impl NodeItem {
    /// Find a port on this item
    pub fn port(&self, id: &PortId) -> Option<&PortItem> {
        self.inputs.iter().chain(self.outputs.iter()).find(|port| port.id == *id)
    }
}

/// Visual item for a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionItem {
    /// Item id
    pub item_id: ItemId,
    /// Backing connection
    pub id: ConnectionId,
    /// Selection state
    pub selected: bool,
}

/// What a live node will create when committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementRequest {
    /// Catalog node with ports
    Node(String),
    /// Node of an accepted document type, without ports
    Typed(String),
    /// Shader node for a shader id
    Shader(String),
}

impl PlacementRequest {
    /// Requested type or shader id
    pub fn type_name(&self) -> &str {
        match self {
            Self::Node(name) | Self::Typed(name) | Self::Shader(name) => name,
        }
    }
}

/// Node being placed
#[derive(Debug, Clone, PartialEq)]
pub struct LiveNode {
    /// Item id
    pub item_id: ItemId,
    /// What to create
    pub request: PlacementRequest,
    /// Current position in graph space
    pub position: [f32; 2],
}

/// Connection being dragged
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConnection {
    /// Item id
    pub item_id: ItemId,
    /// Port the drag started from
    pub from: PortId,
    /// Current cursor position in graph space
    pub cursor: [f32; 2],
}

/// Uncommitted item held by the scene's grabber
#[derive(Debug, Clone, PartialEq)]
pub enum LiveItem {
    /// Node placement
    Node(LiveNode),
    /// Connection drag
    Connection(LiveConnection),
}

impl LiveItem {
    /// Item id
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::Node(node) => node.item_id,
            Self::Connection(connection) => connection.item_id,
        }
    }

    /// Move the item to follow the cursor
    pub fn move_to(&mut self, position: [f32; 2]) {
        match self {
            Self::Node(node) => node.position = position,
            Self::Connection(connection) => connection.cursor = position,
        }
    }
}

/// Factory for visual items of one graph kind
pub struct ItemRegistry {
    token: RegistryToken,
    policy: Rc<dyn GraphPolicy>,
}

impl ItemRegistry {
    /// Create a registry for `policy`
    pub fn new(policy: Rc<dyn GraphPolicy>) -> Self {
        Self {
            token: RegistryToken(Uuid::new_v4()),
            policy,
        }
    }

    /// Create a registry for a built-in graph kind
    pub fn with_kind(kind: GraphKind) -> Self {
        Self::new(kind.policy())
    }

    /// Identity of this registry instance
    pub fn token(&self) -> RegistryToken {
        self.token
    }

    /// Graph kind served by this registry
    pub fn kind(&self) -> GraphKind {
        self.policy.kind()
    }

    fn require_open(model: &GraphModel) -> Result<()> {
        if model.get_root().is_empty() {
            return Err(ValidationError::InvalidRoot(model.get_root().clone()).into());
        }
        Ok(())
    }

    fn live_node(request: PlacementRequest) -> LiveItem {
        LiveItem::Node(LiveNode {
            item_id: ItemId::new(),
            request,
            position: [0.0, 0.0],
        })
    }

    /// Start placing a catalog node
    pub fn make_live_node(&self, model: &GraphModel, type_name: &str) -> Result<LiveItem> {
        Self::require_open(model)?;
        if !self.policy.supports_type(type_name) || self.policy.catalog().get(type_name).is_none() {
            return Err(ValidationError::UnsupportedNodeType(type_name.to_string()).into());
        }
        Ok(Self::live_node(PlacementRequest::Node(type_name.to_string())))
    }

    /// Start placing a node of an accepted document type
    pub fn make_live_typed_node(&self, model: &GraphModel, type_name: &str) -> Result<LiveItem> {
        Self::require_open(model)?;
        if !self.policy.supports_type(type_name) {
            return Err(ValidationError::UnsupportedNodeType(type_name.to_string()).into());
        }
        Ok(Self::live_node(PlacementRequest::Typed(type_name.to_string())))
    }

    /// Start placing a shader node
    pub fn make_live_shader_node(&self, model: &GraphModel, shader_id: &str) -> Result<LiveItem> {
        Self::require_open(model)?;
        if self.policy.kind() != GraphKind::Shading {
            return Err(ValidationError::UnsupportedOperation("shader nodes").into());
        }
        if self.policy.catalog().get(shader_id).is_none() {
            return Err(ValidationError::UnsupportedNodeType(shader_id.to_string()).into());
        }
        Ok(Self::live_node(PlacementRequest::Shader(shader_id.to_string())))
    }

    /// Start dragging a connection from `port`
    pub fn make_live_connection(&self, model: &GraphModel, port: &PortId) -> Option<LiveItem> {
        let descriptor = model.port(port)?;
        let cursor = model
            .node(&port.node)
            .map_or([0.0, 0.0], |node| node.position);
        Some(LiveItem::Connection(LiveConnection {
            item_id: ItemId::new(),
            from: descriptor.id.clone(),
            cursor,
        }))
    }

    /// Create the node a live item stands for at `position`
    pub fn commit_live_node(&self, model: &mut GraphModel, live: &LiveNode, position: [f32; 2]) -> Result<NodeId> {
        match &live.request {
            PlacementRequest::Node(type_name) => model.create_node(type_name, position),
            PlacementRequest::Typed(type_name) => model.create_typed_node(type_name, position),
            PlacementRequest::Shader(shader_id) => model.create_shader_node(shader_id, position),
        }
    }

    /// Finish a connection drag on `target`.
    ///
    /// Invalid attempts write nothing and yield `Ok(None)`; only document
    /// failures are errors.
    pub fn commit_live_connection(
        &self,
        model: &mut GraphModel,
        live: &LiveConnection,
        target: &PortId,
    ) -> Result<Option<ConnectionId>> {
        match model.connect(&live.from, target) {
            Ok(id) => Ok(Some(id)),
            Err(GraphError::Transaction(e)) => Err(GraphError::Transaction(e)),
            Err(e) => {
                tracing::debug!("Discarding connection from {} to {}: {}", live.from, target, e);
                Ok(None)
            }
        }
    }

    fn item_kind(&self, model: &GraphModel, descriptor: &NodeDescriptor) -> NodeItemKind {
        match descriptor.type_name.as_str() {
            BACKDROP_TYPE => NodeItemKind::Backdrop,
            MATERIAL_TYPE => NodeItemKind::Material,
            SHADER_TYPE => {
                let document = model.document().borrow();
                let id = document
                    .get_node(descriptor.id.path())
                    .and_then(|node| shader_id(&node).map(str::to_string))
                    .unwrap_or_default();
                NodeItemKind::Shader { shader_id: id }
            }
            type_name if self.policy.is_navigable(type_name) => NodeItemKind::Container,
            _ => NodeItemKind::Generic,
        }
    }

    fn header_color(&self, model: &GraphModel, descriptor: &NodeDescriptor, kind: &NodeItemKind) -> [u8; 3] {
        let custom = model
            .document()
            .borrow()
            .get_node(descriptor.id.path())
            .and_then(|node| node.metadata.display_color);
        if let Some(color) = custom {
            return color;
        }
        match kind {
            NodeItemKind::Container => [90, 110, 70],
            NodeItemKind::Backdrop => [60, 60, 70],
            NodeItemKind::Shader { .. } => [120, 80, 110],
            NodeItemKind::Material => [130, 90, 60],
            NodeItemKind::Generic if !descriptor.supported => [90, 90, 90],
            NodeItemKind::Generic => [70, 100, 130],
        }
    }

    /// Build the visual item for a node descriptor
    pub fn make_node_item(&self, model: &GraphModel, descriptor: &NodeDescriptor) -> NodeItem {
        let kind = self.item_kind(model, descriptor);
        let color = self.header_color(model, descriptor, &kind);
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for port in model.ports_for_node(&descriptor.id) {
            let item = PortItem {
                id: port.id.clone(),
                port_type: port.port_type.clone(),
                label: port.id.short_name().to_string(),
            };
            match port.direction() {
                PortDirection::Input => inputs.push(item),
                PortDirection::Output => outputs.push(item),
                PortDirection::Unknown => {}
            }
        }

        NodeItem {
            item_id: ItemId::new(),
            node: descriptor.id.clone(),
            kind,
            title: descriptor.name.clone(),
            type_name: descriptor.type_name.clone(),
            position: descriptor.position,
            color,
            bypassed: descriptor.bypassed,
            is_terminal: model.get_terminal_node() == Some(&descriptor.id),
            selected: model.selection().contains_node(&descriptor.id),
            inputs,
            outputs,
        }
    }

    /// Build the visual item for a connection; `None` if an endpoint is not
    /// materialized
    pub fn make_connection_item(&self, model: &GraphModel, id: &ConnectionId) -> Option<ConnectionItem> {
        model.port(&id.start)?;
        model.port(&id.end)?;
        Some(ConnectionItem {
            item_id: ItemId::new(),
            id: id.clone(),
            selected: model.selection().contains_connection(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{path, Fixture};

    fn open(fixture: &Fixture, kind: GraphKind, root: &str) -> GraphModel {
        let mut model = GraphModel::with_kind(fixture.handle.clone(), fixture.selection_handle.clone(), kind);
        model.set_root(&path(root)).unwrap();
        model.drain_events();
        model
    }

    #[test]
    fn test_item_kinds() {
        let fixture = Fixture::procedural();
        let model = open(&fixture, GraphKind::Procedural, "/Graph1");
        let registry = ItemRegistry::with_kind(GraphKind::Procedural);

        let kind_of = |name: &str| {
            let descriptor = model.node(&NodeId::new(path(name))).unwrap();
            registry.make_node_item(&model, descriptor).kind
        };
        assert_eq!(kind_of("/Graph1/Add1"), NodeItemKind::Generic);
        assert_eq!(kind_of("/Graph1/Group1"), NodeItemKind::Container);
        assert_eq!(kind_of("/Graph1/Material1"), NodeItemKind::Material);

        let add = registry.make_node_item(&model, model.node(&NodeId::new(path("/Graph1/Add1"))).unwrap());
        assert_eq!(add.inputs.len(), 2);
        assert_eq!(add.outputs.len(), 1);
        assert_eq!(add.outputs[0].label, "out");
    }

    #[test]
    fn test_shader_items() {
        let fixture = Fixture::procedural();
        let model = open(&fixture, GraphKind::Shading, "/Graph1/Material1");
        let registry = ItemRegistry::with_kind(GraphKind::Shading);
        let descriptor = model.node(&NodeId::new(path("/Graph1/Material1/Texture1"))).unwrap();
        assert_eq!(
            registry.make_node_item(&model, descriptor).kind,
            NodeItemKind::Shader {
                shader_id: "UVTexture".to_string()
            }
        );
    }

    #[test]
    fn test_live_node_validation() {
        let fixture = Fixture::procedural();
        let mut model = open(&fixture, GraphKind::Procedural, "/Graph1");
        let registry = ItemRegistry::with_kind(GraphKind::Procedural);
        let before = fixture.handle.borrow().transaction_count();

        assert!(registry.make_live_node(&model, "Teleport").is_err());
        assert!(registry.make_live_shader_node(&model, "PreviewSurface").is_err());
        assert_eq!(fixture.handle.borrow().transaction_count(), before);

        let LiveItem::Node(live) = registry.make_live_node(&model, "Merge").unwrap() else {
            panic!("expected a live node");
        };
        let id = registry.commit_live_node(&mut model, &live, [5.0, 5.0]).unwrap();
        assert_eq!(id, NodeId::new(path("/Graph1/Merge1")));
        assert_eq!(fixture.handle.borrow().transaction_count(), before + 1);
    }

    #[test]
    fn test_invalid_connection_is_discarded() {
        let fixture = Fixture::procedural();
        let mut model = open(&fixture, GraphKind::Procedural, "/Graph1");
        let registry = ItemRegistry::with_kind(GraphKind::Procedural);
        let before = fixture.handle.borrow().transaction_count();

        let out = PortId::new(NodeId::new(path("/Graph1/Add1")), "outputs:out");
        let Some(LiveItem::Connection(live)) = registry.make_live_connection(&model, &out) else {
            panic!("expected a live connection");
        };
        let self_loop = PortId::new(NodeId::new(path("/Graph1/Add1")), "inputs:b");
        assert_eq!(registry.commit_live_connection(&mut model, &live, &self_loop).unwrap(), None);
        assert_eq!(fixture.handle.borrow().transaction_count(), before);

        let target = PortId::new(NodeId::new(path("/Graph1/Add2")), "inputs:b");
        let created = registry.commit_live_connection(&mut model, &live, &target).unwrap();
        assert!(created.is_some());
        assert_eq!(fixture.handle.borrow().transaction_count(), before + 1);

        assert!(registry
            .make_live_connection(&model, &PortId::new(NodeId::new(path("/Graph1/Gone")), "outputs:out"))
            .is_none());
    }

    #[test]
    fn test_connection_item_requires_endpoints() {
        let fixture = Fixture::procedural();
        let model = open(&fixture, GraphKind::Procedural, "/Graph1");
        let registry = ItemRegistry::with_kind(GraphKind::Procedural);

        let existing = model.connections().next().cloned().unwrap();
        assert!(registry.make_connection_item(&model, &existing).is_some());

        let dangling = ConnectionId::new(
            PortId::new(NodeId::new(path("/Graph1/Gone")), "outputs:out"),
            existing.end.clone(),
        );
        assert!(registry.make_connection_item(&model, &dangling).is_none());
    }
}
