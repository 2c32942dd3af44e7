// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph scene: visual items mirroring the bound model one to one.
//!
//! The scene never reads the document. It applies [`GraphEvent`]s from the
//! bound model, asks the bound [`ItemRegistry`] to build items, and turns
//! user gestures into [`SceneEvent`]s for the controller.

use crate::connection::ConnectionId;
use crate::event::{EventBus, GraphEvent, SceneEvent, Selection};
use crate::model::{GraphModel, ModelToken};
use crate::node::NodeId;
use crate::port::{PortDirection, PortId};
use crate::registry::{ConnectionItem, ItemRegistry, LiveItem, NodeItem, RegistryToken};
use indexmap::IndexMap;

/// Node width in graph units
pub const NODE_WIDTH: f32 = 180.0;
/// Header height in graph units
pub const NODE_HEADER_HEIGHT: f32 = 24.0;
/// Height of one port row in graph units
pub const PORT_HEIGHT: f32 = 22.0;
/// Padding below the last port row
pub const NODE_FOOTER: f32 = 8.0;

/// Thing under the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverTarget {
    /// A node
    Node(NodeId),
    /// A port
    Port(PortId),
    /// A connection
    Connection(ConnectionId),
}

/// Supplies hover descriptions; installed by the controller
pub type DescriptionProvider = Box<dyn Fn(&HoverTarget) -> Option<String>>;

/// Size of a node item in graph units
pub fn node_size(item: &NodeItem) -> [f32; 2] {
    let rows = item.inputs.len().max(item.outputs.len());
    [NODE_WIDTH, NODE_HEADER_HEIGHT + rows as f32 * PORT_HEIGHT + NODE_FOOTER]
}

/// Visual container for one graph
pub struct GraphScene {
    model_token: Option<ModelToken>,
    registry_token: Option<RegistryToken>,
    nodes: IndexMap<NodeId, NodeItem>,
    connections: IndexMap<ConnectionId, ConnectionItem>,
    grabber: Option<LiveItem>,
    hover: Option<HoverTarget>,
    description_provider: Option<DescriptionProvider>,
    events: EventBus<SceneEvent>,
}

impl GraphScene {
    /// Create an unbound, empty scene
    pub fn new() -> Self {
        Self {
            model_token: None,
            registry_token: None,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            grabber: None,
            hover: None,
            description_provider: None,
            events: EventBus::new(),
        }
    }

    // ------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------

    /// Bind to `model` and `registry` and rebuild every item
    pub fn initialize(&mut self, model: &GraphModel, registry: &ItemRegistry) {
        self.set_model(model);
        self.set_item_registry(registry);
        self.rebuild(model, registry);
    }

    /// Bind a different model; items are kept until the next rebuild
    pub fn set_model(&mut self, model: &GraphModel) {
        self.model_token = Some(model.token());
    }

    /// Bind a different item registry
    pub fn set_item_registry(&mut self, registry: &ItemRegistry) {
        self.registry_token = Some(registry.token());
    }

    /// Whether the scene is bound to this model/registry pair
    pub fn is_bound_to(&self, model: ModelToken, registry: RegistryToken) -> bool {
        self.model_token == Some(model) && self.registry_token == Some(registry)
    }

    /// Token of the bound model
    pub fn model_token(&self) -> Option<ModelToken> {
        self.model_token
    }

    /// Token of the bound registry
    pub fn registry_token(&self) -> Option<RegistryToken> {
        self.registry_token
    }

    /// Drop every item and rebuild from the model
    pub fn rebuild(&mut self, model: &GraphModel, registry: &ItemRegistry) {
        self.cancel_grabber();
        self.hover = None;
        self.nodes = model
            .nodes()
            .map(|descriptor| (descriptor.id.clone(), registry.make_node_item(model, descriptor)))
            .collect();
        self.connections = model
            .connections()
            .filter_map(|id| registry.make_connection_item(model, id).map(|item| (id.clone(), item)))
            .collect();
    }

    // ------------------------------------------------------------------
    // Model events
    // ------------------------------------------------------------------

    /// Apply one model event. Events from a model or registry other than the
    /// bound ones are dropped; returns whether the event was applied.
    pub fn handle_model_event(
        &mut self,
        source: ModelToken,
        event: &GraphEvent,
        model: &GraphModel,
        registry: &ItemRegistry,
    ) -> bool {
        if self.model_token != Some(source) || self.registry_token != Some(registry.token()) {
            tracing::debug!("Dropping event from unbound model: {:?}", event);
            return false;
        }

        match event {
            GraphEvent::ModelReset => self.rebuild(model, registry),
            GraphEvent::NodeCreated(id) | GraphEvent::NodeUpdated(id) => self.refresh_node(id, model, registry),
            GraphEvent::NodeRemoved(id) => {
                self.nodes.shift_remove(id);
                self.connections.retain(|connection, _| !connection.involves_node(id));
                if self.hover_involves_node(id) {
                    self.hover = None;
                }
                if self.grabber_starts_at(|port| port.node == *id) {
                    self.cancel_grabber();
                }
            }
            GraphEvent::PortUpdated(port) => {
                self.refresh_node(&port.node, model, registry);
                if model.port(port).is_none() && self.grabber_starts_at(|from| from == port) {
                    self.cancel_grabber();
                }
            }
            GraphEvent::ConnectionCreated(id) => {
                if let Some(item) = registry.make_connection_item(model, id) {
                    self.connections.insert(id.clone(), item);
                }
            }
            GraphEvent::ConnectionRemoved(id) => {
                self.connections.shift_remove(id);
                if self.hover == Some(HoverTarget::Connection(id.clone())) {
                    self.hover = None;
                }
            }
            GraphEvent::SelectionChanged(selection) => self.apply_selection(selection),
            GraphEvent::TerminalNodeChanged(terminal) => {
                for (id, item) in &mut self.nodes {
                    item.is_terminal = terminal.as_ref() == Some(id);
                }
            }
        }
        true
    }

    fn refresh_node(&mut self, id: &NodeId, model: &GraphModel, registry: &ItemRegistry) {
        let Some(descriptor) = model.node(id) else {
            self.nodes.shift_remove(id);
            return;
        };
        let mut item = registry.make_node_item(model, descriptor);
        if let Some(existing) = self.nodes.get(id) {
            item.item_id = existing.item_id;
        }
        self.nodes.insert(id.clone(), item);
    }

    fn apply_selection(&mut self, selection: &Selection) {
        for (id, item) in &mut self.nodes {
            item.selected = selection.contains_node(id);
        }
        for (id, item) in &mut self.connections {
            item.selected = selection.contains_connection(id);
        }
    }

    fn hover_involves_node(&self, id: &NodeId) -> bool {
        match &self.hover {
            Some(HoverTarget::Node(node)) => node == id,
            Some(HoverTarget::Port(port)) => port.node == *id,
            Some(HoverTarget::Connection(connection)) => connection.involves_node(id),
            None => false,
        }
    }

    fn grabber_starts_at(&self, predicate: impl Fn(&PortId) -> bool) -> bool {
        matches!(&self.grabber, Some(LiveItem::Connection(live)) if predicate(&live.from))
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    /// A port was pressed
    pub fn press_port(&mut self, port: PortId) {
        self.events.emit(SceneEvent::PortPressed(port));
    }

    /// A connection drag was released over `target` (or empty space)
    pub fn release_connection(&mut self, target: Option<PortId>) {
        self.events.emit(SceneEvent::ConnectionDropped(target));
    }

    /// A node was double-clicked
    pub fn double_click_node(&mut self, id: NodeId) {
        if self.nodes.contains_key(&id) {
            self.events.emit(SceneEvent::NodeDoubleClicked(id));
        }
    }

    /// Nodes were dragged by `delta`
    pub fn move_nodes(&mut self, ids: Vec<NodeId>, delta: [f32; 2]) {
        if ids.is_empty() || delta == [0.0, 0.0] {
            return;
        }
        self.events.emit(SceneEvent::NodesMoved { ids, delta });
    }

    /// A node was renamed in place
    pub fn rename_node(&mut self, id: NodeId, name: String) {
        self.events.emit(SceneEvent::NodeRenamed { id, name });
    }

    /// The user changed the selection
    pub fn select(&mut self, selection: Selection) {
        self.events.emit(SceneEvent::SelectionChanged(selection));
    }

    /// The pending placement was dropped at `position`
    pub fn request_placement(&mut self, position: [f32; 2]) {
        self.events.emit(SceneEvent::PlacementRequested(position));
    }

    /// Delete the selection
    pub fn request_delete(&mut self) {
        self.events.emit(SceneEvent::DeleteRequested);
    }

    /// Cancel the current gesture
    pub fn request_cancel(&mut self) {
        self.events.emit(SceneEvent::CancelRequested);
    }

    /// Take queued gestures
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain()
    }

    /// Event bus, for registering observers
    pub fn events_mut(&mut self) -> &mut EventBus<SceneEvent> {
        &mut self.events
    }

    // ------------------------------------------------------------------
    // Grabber
    // ------------------------------------------------------------------

    /// Install a grabber, cancelling the pending one. Returns the cancelled item.
    pub fn set_grabber(&mut self, item: LiveItem) -> Option<LiveItem> {
        let previous = self.grabber.replace(item);
        if let Some(previous) = &previous {
            tracing::debug!("Cancelled pending grabber {}", previous.item_id());
        }
        previous
    }

    /// Discard the grabber; returns whether one existed
    pub fn cancel_grabber(&mut self) -> bool {
        self.grabber.take().is_some()
    }

    /// Remove the grabber for committing
    pub fn take_grabber(&mut self) -> Option<LiveItem> {
        self.grabber.take()
    }

    /// Current grabber
    pub fn grabber(&self) -> Option<&LiveItem> {
        self.grabber.as_ref()
    }

    /// Move the grabber to follow the cursor
    pub fn move_grabber(&mut self, position: [f32; 2]) {
        if let Some(grabber) = &mut self.grabber {
            grabber.move_to(position);
        }
    }

    // ------------------------------------------------------------------
    // Hover
    // ------------------------------------------------------------------

    /// Install the hover description callback
    pub fn set_description_provider(&mut self, provider: DescriptionProvider) {
        self.description_provider = Some(provider);
    }

    /// Set what is under the cursor
    pub fn set_hover(&mut self, target: Option<HoverTarget>) {
        self.hover = target;
    }

    /// What is under the cursor
    pub fn hover(&self) -> Option<&HoverTarget> {
        self.hover.as_ref()
    }

    /// Description of the hovered item, from the provider
    pub fn hint_text(&self) -> Option<String> {
        let target = self.hover.as_ref()?;
        let provider = self.description_provider.as_ref()?;
        provider(target)
    }

    // ------------------------------------------------------------------
    // Items and layout
    // ------------------------------------------------------------------

    /// Node items in model order
    pub fn node_items(&self) -> impl Iterator<Item = &NodeItem> {
        self.nodes.values()
    }

    /// Node item by node id
    pub fn node_item(&self, id: &NodeId) -> Option<&NodeItem> {
        self.nodes.get(id)
    }

    /// Connection items
    pub fn connection_items(&self) -> impl Iterator<Item = &ConnectionItem> {
        self.connections.values()
    }

    /// Connection item by connection id
    pub fn connection_item(&self, id: &ConnectionId) -> Option<&ConnectionItem> {
        self.connections.get(id)
    }

    /// Number of node and connection items
    pub fn item_count(&self) -> usize {
        self.nodes.len() + self.connections.len()
    }

    /// Ids of selected node items
    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|item| item.selected)
            .map(|item| item.node.clone())
            .collect()
    }

    /// Current selection as shown by the items
    pub fn selection(&self) -> Selection {
        Selection {
            nodes: self.selected_nodes().into_iter().collect(),
            connections: self
                .connections
                .values()
                .filter(|item| item.selected)
                .map(|item| item.id.clone())
                .collect(),
        }
    }

    /// Position of a port in graph space
    pub fn port_position(&self, port: &PortId) -> Option<[f32; 2]> {
        let item = self.nodes.get(&port.node)?;
        let (index, x) = match port.direction {
            PortDirection::Input => (item.inputs.iter().position(|p| p.id == *port)?, item.position[0]),
            PortDirection::Output => (
                item.outputs.iter().position(|p| p.id == *port)?,
                item.position[0] + NODE_WIDTH,
            ),
            PortDirection::Unknown => return None,
        };
        let y = item.position[1] + NODE_HEADER_HEIGHT + index as f32 * PORT_HEIGHT + PORT_HEIGHT / 2.0;
        Some([x, y])
    }

    /// Topmost node under a graph-space position
    pub fn node_at(&self, position: [f32; 2]) -> Option<&NodeItem> {
        self.nodes.values().rev().find(|item| {
            let [width, height] = node_size(item);
            position[0] >= item.position[0]
                && position[0] <= item.position[0] + width
                && position[1] >= item.position[1]
                && position[1] <= item.position[1] + height
        })
    }

    /// Port within `radius` of a graph-space position
    pub fn port_at(&self, position: [f32; 2], radius: f32) -> Option<PortId> {
        self.nodes
            .values()
            .flat_map(|item| item.inputs.iter().chain(item.outputs.iter()))
            .find(|port| {
                self.port_position(&port.id).is_some_and(|[x, y]| {
                    let (dx, dy) = (x - position[0], y - position[1]);
                    dx * dx + dy * dy <= radius * radius
                })
            })
            .map(|port| port.id.clone())
    }
}

impl Default for GraphScene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{path, Fixture};
    use crate::graphs::GraphKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Bound {
        model: GraphModel,
        registry: ItemRegistry,
        scene: GraphScene,
    }

    impl Bound {
        fn new(fixture: &Fixture) -> Self {
            let mut model = GraphModel::with_kind(
                fixture.handle.clone(),
                fixture.selection_handle.clone(),
                GraphKind::Procedural,
            );
            model.set_root(&path("/Graph1")).unwrap();
            model.drain_events();
            let registry = ItemRegistry::with_kind(GraphKind::Procedural);
            let mut scene = GraphScene::new();
            scene.initialize(&model, &registry);
            Self { model, registry, scene }
        }

        fn pump(&mut self) {
            self.model.sync();
            for event in self.model.drain_events() {
                self.scene
                    .handle_model_event(self.model.token(), &event, &self.model, &self.registry);
            }
        }
    }

    fn node(s: &str) -> NodeId {
        NodeId::new(path(s))
    }

    #[test]
    fn test_items_mirror_model() {
        let fixture = Fixture::procedural();
        let mut bound = Bound::new(&fixture);
        assert_eq!(bound.scene.node_items().count(), bound.model.node_count());
        assert_eq!(bound.scene.connection_items().count(), 1);

        let add1 = node("/Graph1/Add1");
        let item_id = bound.scene.node_item(&add1).unwrap().item_id;
        bound.model.on_nodes_moved(&[add1.clone()], [10.0, 0.0]).unwrap();
        bound.pump();
        let moved = bound.scene.node_item(&add1).unwrap();
        assert_eq!(moved.position, [10.0, 0.0]);
        assert_eq!(moved.item_id, item_id);

        bound.model.remove(&[add1.clone()], &[]).unwrap();
        bound.pump();
        assert!(bound.scene.node_item(&add1).is_none());
        assert_eq!(bound.scene.connection_items().count(), 0);
        assert_eq!(bound.scene.node_items().count(), bound.model.node_count());
    }

    #[test]
    fn test_unbound_events_are_dropped() {
        let fixture = Fixture::procedural();
        let mut bound = Bound::new(&fixture);
        let mut other = GraphModel::with_kind(
            fixture.handle.clone(),
            fixture.selection_handle.clone(),
            GraphKind::Procedural,
        );
        other.set_root(&path("/Graph1/Group1")).unwrap();

        let before = bound.scene.node_items().count();
        let applied = bound
            .scene
            .handle_model_event(other.token(), &GraphEvent::ModelReset, &other, &bound.registry);
        assert!(!applied);
        assert_eq!(bound.scene.node_items().count(), before);

        let foreign_registry = ItemRegistry::with_kind(GraphKind::Procedural);
        let applied = bound.scene.handle_model_event(
            bound.model.token(),
            &GraphEvent::ModelReset,
            &bound.model,
            &foreign_registry,
        );
        assert!(!applied);
    }

    #[test]
    fn test_rebinding_keeps_scene() {
        let fixture = Fixture::procedural();
        let mut bound = Bound::new(&fixture);
        let mut other = GraphModel::with_kind(
            fixture.handle.clone(),
            fixture.selection_handle.clone(),
            GraphKind::Procedural,
        );
        other.set_root(&path("/Graph1/Group1")).unwrap();

        bound.scene.set_model(&other);
        assert_eq!(bound.scene.node_items().count(), 5);
        assert!(bound
            .scene
            .handle_model_event(other.token(), &GraphEvent::ModelReset, &other, &bound.registry));
        assert_eq!(bound.scene.node_items().count(), 1);
    }

    #[test]
    fn test_one_grabber_at_a_time() {
        let fixture = Fixture::procedural();
        let mut bound = Bound::new(&fixture);
        let first = bound.registry.make_live_node(&bound.model, "Add").unwrap();
        let second = bound.registry.make_live_node(&bound.model, "Merge").unwrap();

        assert!(bound.scene.set_grabber(first.clone()).is_none());
        assert_eq!(bound.scene.set_grabber(second.clone()), Some(first));
        assert_eq!(bound.scene.grabber(), Some(&second));

        assert!(bound.scene.cancel_grabber());
        assert!(!bound.scene.cancel_grabber());
        assert!(bound.scene.grabber().is_none());
    }

    #[test]
    fn test_connection_grabber_dropped_with_its_node() {
        let fixture = Fixture::procedural();
        let mut bound = Bound::new(&fixture);
        let out = PortId::new(node("/Graph1/Add1"), "outputs:out");
        let live = bound.registry.make_live_connection(&bound.model, &out).unwrap();
        bound.scene.set_grabber(live);

        bound.model.remove(&[node("/Graph1/Add1")], &[]).unwrap();
        bound.pump();
        assert!(bound.scene.grabber().is_none());
    }

    #[test]
    fn test_hint_text_comes_from_provider() {
        let fixture = Fixture::procedural();
        let mut bound = Bound::new(&fixture);
        let asked = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&asked);
        bound.scene.set_description_provider(Box::new(move |target| {
            *counter.borrow_mut() += 1;
            match target {
                HoverTarget::Node(id) => Some(format!("node {}", id.name())),
                _ => None,
            }
        }));

        assert_eq!(bound.scene.hint_text(), None);
        bound.scene.set_hover(Some(HoverTarget::Node(node("/Graph1/Add2"))));
        assert_eq!(bound.scene.hint_text().as_deref(), Some("node Add2"));
        assert_eq!(*asked.borrow(), 1);
    }

    #[test]
    fn test_selection_and_terminal_flags() {
        let fixture = Fixture::procedural();
        let mut bound = Bound::new(&fixture);
        let add2 = node("/Graph1/Add2");

        bound.model.on_selection_set(Selection::from_nodes([add2.clone()]));
        bound.model.set_terminal_node(Some(&add2)).unwrap();
        bound.pump();

        assert_eq!(bound.scene.selected_nodes(), vec![add2.clone()]);
        assert!(bound.scene.node_item(&add2).unwrap().is_terminal);
        assert!(!bound.scene.node_item(&node("/Graph1/Add1")).unwrap().is_terminal);
    }

    #[test]
    fn test_gestures_are_queued() {
        let fixture = Fixture::procedural();
        let mut bound = Bound::new(&fixture);
        bound.scene.double_click_node(node("/Graph1/Group1"));
        bound.scene.double_click_node(node("/Graph1/Gone"));
        bound.scene.move_nodes(vec![node("/Graph1/Add1")], [0.0, 0.0]);
        bound.scene.request_cancel();

        assert_eq!(
            bound.scene.drain_events(),
            vec![
                SceneEvent::NodeDoubleClicked(node("/Graph1/Group1")),
                SceneEvent::CancelRequested
            ]
        );
    }

    #[test]
    fn test_port_layout() {
        let fixture = Fixture::procedural();
        let bound = Bound::new(&fixture);
        let add2 = node("/Graph1/Add2");

        let input_b = PortId::new(add2.clone(), "inputs:b");
        let [x, y] = bound.scene.port_position(&input_b).unwrap();
        assert_eq!(x, 200.0);
        assert_eq!(y, NODE_HEADER_HEIGHT + PORT_HEIGHT * 1.5);

        let output = PortId::new(add2.clone(), "outputs:out");
        assert_eq!(bound.scene.port_position(&output).unwrap()[0], 200.0 + NODE_WIDTH);
        assert_eq!(bound.scene.port_at([x + 1.0, y], 6.0), Some(input_b));
        assert_eq!(bound.scene.node_at([250.0, 10.0]).map(|item| item.node.clone()), Some(add2));
    }
}
