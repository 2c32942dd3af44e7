// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph model: the document subtree under the current root, seen as nodes,
//! ports and connections.
//!
//! The model caches descriptors built from the document and keeps them in
//! step with it:
//! - [`GraphModel::set_root`] rebuilds everything and emits
//!   [`GraphEvent::ModelReset`].
//! - [`GraphModel::sync`] drains queued document and selection
//!   notifications and reconciles the cache, emitting fine-grained events.
//!
//! Mutating methods never touch the cache. Each one writes the document in
//! exactly one transaction (joining an enclosing one if open); the resulting
//! notifications flow back through `sync`, so self-originated and external
//! edits take the same path.

use crate::connection::ConnectionId;
use crate::error::{GraphError, Result, ValidationError};
use crate::event::{EventBus, GraphEvent, Selection};
use crate::graphs::shading::{NODE_GRAPH_TYPE, SHADER_ID_PROPERTY, SHADER_TYPE};
use crate::graphs::{GraphKind, GraphPolicy};
use crate::node::{NodeDescriptor, NodeId};
use crate::port::{PortDescriptor, PortDirection, PortId, PortTemplate};
use indexmap::{IndexMap, IndexSet};
use nodeweave_document::adapter::Result as DocumentResult;
use nodeweave_document::{
    is_valid_name, DocPath, DocumentAdapter, DocumentChange, DocumentError, DocumentHandle, DocumentNode, Property,
    PropertyPath, PropertyValue, SelectionHandle, Subscription, TransactionGuard,
};
use std::rc::Rc;
use uuid::Uuid;

/// Identity of a model instance, used to drop events from unbound models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelToken(Uuid);

impl ModelToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Descriptor set built from one scan of the document
#[derive(Debug, Default)]
struct GraphSnapshot {
    nodes: IndexMap<NodeId, NodeDescriptor>,
    ports: IndexMap<PortId, PortDescriptor>,
    connections: IndexSet<ConnectionId>,
    terminal: Option<NodeId>,
}

/// Model of the graph rooted at one document container
pub struct GraphModel {
    token: ModelToken,
    document: DocumentHandle,
    selection_service: SelectionHandle,
    policy: Rc<dyn GraphPolicy>,
    root: DocPath,
    nodes: IndexMap<NodeId, NodeDescriptor>,
    ports: IndexMap<PortId, PortDescriptor>,
    connections: IndexSet<ConnectionId>,
    selection: Selection,
    terminal: Option<NodeId>,
    document_changes: Option<Subscription<DocumentChange>>,
    selection_changes: Subscription<Vec<DocPath>>,
    events: EventBus<GraphEvent>,
}

impl GraphModel {
    /// Create an empty model (no root) using `policy`
    pub fn new(document: DocumentHandle, selection: SelectionHandle, policy: Rc<dyn GraphPolicy>) -> Self {
        let selection_changes = selection.borrow_mut().subscribe();
        Self {
            token: ModelToken::new(),
            document,
            selection_service: selection,
            policy,
            root: DocPath::empty(),
            nodes: IndexMap::new(),
            ports: IndexMap::new(),
            connections: IndexSet::new(),
            selection: Selection::default(),
            terminal: None,
            document_changes: None,
            selection_changes,
            events: EventBus::new(),
        }
    }

    /// Create an empty model for a built-in graph kind
    pub fn with_kind(document: DocumentHandle, selection: SelectionHandle, kind: GraphKind) -> Self {
        Self::new(document, selection, kind.policy())
    }

    // ------------------------------------------------------------------
    // Root
    // ------------------------------------------------------------------

    /// Edit the container at `path`; the empty path closes the graph.
    ///
    /// An invalid path leaves the model untouched.
    pub fn set_root(&mut self, path: &DocPath) -> Result<()> {
        if path.is_empty() {
            self.clear();
            tracing::debug!("Graph closed");
            self.events.emit(GraphEvent::ModelReset);
            return Ok(());
        }

        let node = self.document.borrow().get_node(path);
        match node {
            Some(node) if self.policy.can_be_root(&node) => {}
            _ => return Err(ValidationError::InvalidRoot(path.clone()).into()),
        }

        self.root = path.clone();
        let subscription = self.document.borrow_mut().subscribe(path);
        self.document_changes = Some(subscription);
        // Notifications issued before this point are covered by the scan.
        self.selection_changes.drain();

        let snapshot = self.scan();
        self.nodes = snapshot.nodes;
        self.ports = snapshot.ports;
        self.connections = snapshot.connections;
        self.terminal = snapshot.terminal;
        let selected = self.selection_service.borrow().selected_paths();
        self.selection = Selection::from_nodes(
            selected
                .into_iter()
                .map(NodeId::new)
                .filter(|id| self.nodes.contains_key(id)),
        );

        tracing::info!(
            "{} graph root set to {} ({} nodes, {} connections)",
            self.policy.kind().label(),
            path,
            self.nodes.len(),
            self.connections.len()
        );
        self.events.emit(GraphEvent::ModelReset);
        Ok(())
    }

    /// Current root; empty when no graph is open
    pub fn get_root(&self) -> &DocPath {
        &self.root
    }

    fn clear(&mut self) {
        self.root = DocPath::empty();
        self.nodes.clear();
        self.ports.clear();
        self.connections.clear();
        self.selection = Selection::default();
        self.terminal = None;
        self.document_changes = None;
    }

    fn require_root(&self) -> Result<&DocPath> {
        if self.root.is_empty() {
            return Err(ValidationError::InvalidRoot(self.root.clone()).into());
        }
        Ok(&self.root)
    }

    /// Cached ids may outlive their document node until the next `sync`
    fn require_live_node(&self, id: &NodeId) -> Result<()> {
        if self.document.borrow().get_node(id.path()).is_none() {
            return Err(GraphError::Consistency(format!("node {id} no longer exists")));
        }
        Ok(())
    }

    fn require_live_port(&self, port: &PortId) -> Result<()> {
        let exists = self
            .document
            .borrow()
            .get_node(port.node.path())
            .is_some_and(|node| node.property(&port.property).is_some());
        if !exists {
            return Err(GraphError::Consistency(format!("port {port} no longer exists")));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scanning and reconciliation
    // ------------------------------------------------------------------

    fn scan(&self) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::default();
        if self.root.is_empty() {
            return snapshot;
        }
        let document = self.document.borrow();
        let mut inputs = Vec::new();
        self.collect_nodes(&*document, &self.root, None, &mut snapshot, &mut inputs);

        for (target, property) in inputs {
            for source in &property.connections {
                let start = PortId::new(NodeId::new(source.node.clone()), source.name.clone());
                if snapshot.ports.contains_key(&start) && start.direction == PortDirection::Output {
                    snapshot.connections.insert(ConnectionId::new(start, target.clone()));
                }
            }
        }

        snapshot.terminal = document
            .get_terminal(&self.root)
            .map(NodeId::new)
            .filter(|id| snapshot.nodes.contains_key(id));
        snapshot
    }

    fn collect_nodes(
        &self,
        document: &dyn DocumentAdapter,
        container: &DocPath,
        group: Option<&NodeId>,
        snapshot: &mut GraphSnapshot,
        inputs: &mut Vec<(PortId, Property)>,
    ) {
        for child in document.get_children(container) {
            if self.policy.is_transparent(&child) {
                let scope = NodeId::new(child.path.clone());
                self.collect_nodes(document, &child.path, Some(&scope), snapshot, inputs);
                continue;
            }
            if !self.policy.accepts(&child) {
                continue;
            }

            let id = NodeId::new(child.path.clone());
            for property in child.properties.values() {
                let port_type = self.policy.port_type(property);
                let port = PortDescriptor::from_property(id.clone(), property, port_type);
                match port.direction() {
                    PortDirection::Unknown => continue,
                    PortDirection::Input => inputs.push((port.id.clone(), property.clone())),
                    PortDirection::Output => {}
                }
                snapshot.ports.insert(port.id.clone(), port);
            }
            snapshot.nodes.insert(id.clone(), self.describe(&child, id, group.cloned()));
        }
    }

    fn describe(&self, node: &DocumentNode, id: NodeId, group: Option<NodeId>) -> NodeDescriptor {
        NodeDescriptor {
            name: node.name().to_string(),
            type_name: node.type_name.clone(),
            supported: self.policy.catalog_type(node).is_some(),
            bypassed: node.metadata.bypass,
            position: node.metadata.position,
            group,
            id,
        }
    }

    /// Replace the cache with `next`, emitting the difference
    fn reconcile(&mut self, next: GraphSnapshot) {
        let mut events = Vec::new();

        for connection in &self.connections {
            if !next.connections.contains(connection) {
                events.push(GraphEvent::ConnectionRemoved(connection.clone()));
            }
        }
        for port in self.ports.keys() {
            if !next.ports.contains_key(port) && next.nodes.contains_key(&port.node) {
                events.push(GraphEvent::PortUpdated(port.clone()));
            }
        }
        for id in self.nodes.keys() {
            if !next.nodes.contains_key(id) {
                events.push(GraphEvent::NodeRemoved(id.clone()));
            }
        }
        for id in next.nodes.keys() {
            if !self.nodes.contains_key(id) {
                events.push(GraphEvent::NodeCreated(id.clone()));
            }
        }
        for (id, descriptor) in &next.nodes {
            if self.nodes.get(id).is_some_and(|old| old != descriptor) {
                events.push(GraphEvent::NodeUpdated(id.clone()));
            }
        }
        for port in next.ports.keys() {
            if !self.ports.contains_key(port) && self.nodes.contains_key(&port.node) {
                events.push(GraphEvent::PortUpdated(port.clone()));
            }
        }
        for connection in &next.connections {
            if !self.connections.contains(connection) {
                events.push(GraphEvent::ConnectionCreated(connection.clone()));
            }
        }
        if self.terminal != next.terminal {
            events.push(GraphEvent::TerminalNodeChanged(next.terminal.clone()));
        }

        let mut selection = self.selection.clone();
        selection.nodes.retain(|id| next.nodes.contains_key(id));
        selection.connections.retain(|id| next.connections.contains(id));
        if selection != self.selection {
            events.push(GraphEvent::SelectionChanged(selection.clone()));
        }

        self.nodes = next.nodes;
        self.ports = next.ports;
        self.connections = next.connections;
        self.terminal = next.terminal;
        self.selection = selection;

        for event in events {
            self.events.emit(event);
        }
    }

    /// Whether `path` is shown at the current level: a child of the root,
    /// possibly through transparent containers
    fn in_scope(&self, document: &dyn DocumentAdapter, path: &DocPath) -> bool {
        if self.root.is_empty() || *path == self.root || !path.has_prefix(&self.root) {
            return false;
        }
        if self.nodes.contains_key(&NodeId::new(path.clone())) {
            return true;
        }
        let mut current = path.parent();
        while let Some(parent) = current {
            if parent == self.root {
                return true;
            }
            match document.get_node(&parent) {
                Some(node) if self.policy.is_transparent(&node) => current = parent.parent(),
                _ => return false,
            }
        }
        false
    }

    /// Apply queued document and selection notifications.
    ///
    /// Returns whether anything was processed.
    pub fn sync(&mut self) -> bool {
        let changes = self
            .document_changes
            .as_ref()
            .map(Subscription::drain)
            .unwrap_or_default();
        let selections = self.selection_changes.drain();
        if changes.is_empty() && selections.is_empty() {
            return false;
        }

        let mut needs_diff = false;
        for change in &changes {
            if self.root.is_empty() {
                break;
            }
            match change {
                DocumentChange::NodeRemoved(path) if self.root.has_prefix(path) => {
                    tracing::info!("Graph root {} was removed", self.root);
                    self.clear();
                    self.events.emit(GraphEvent::ModelReset);
                    break;
                }
                DocumentChange::NodeRenamed { old, new } if self.root.has_prefix(old) => {
                    let Some(moved) = self.root.replace_prefix(old, new) else {
                        continue;
                    };
                    tracing::info!("Graph root moved from {} to {}", self.root, moved);
                    if let Err(e) = self.set_root(&moved) {
                        tracing::warn!("Cannot follow renamed root: {}", e);
                        self.clear();
                        self.events.emit(GraphEvent::ModelReset);
                    }
                }
                DocumentChange::Reloaded => {
                    let root_valid = self
                        .document
                        .borrow()
                        .get_node(&self.root)
                        .is_some_and(|node| self.policy.can_be_root(&node));
                    if !root_valid {
                        tracing::info!("Graph root {} is gone after reload", self.root);
                        self.clear();
                        self.events.emit(GraphEvent::ModelReset);
                        break;
                    }
                    needs_diff = true;
                }
                DocumentChange::TerminalChanged { root } => {
                    needs_diff |= *root == self.root;
                }
                change => {
                    needs_diff |= self.is_relevant(change);
                }
            }
        }

        if needs_diff && !self.root.is_empty() {
            let snapshot = self.scan();
            self.reconcile(snapshot);
        }

        if let Some(paths) = selections.into_iter().last() {
            self.apply_external_selection(paths);
        }
        true
    }

    fn is_relevant(&self, change: &DocumentChange) -> bool {
        let document = self.document.borrow();
        match change {
            DocumentChange::NodeAdded(path)
            | DocumentChange::NodeRemoved(path)
            | DocumentChange::MetadataChanged(path) => self.in_scope(&*document, path),
            DocumentChange::NodeRenamed { old, new } => {
                self.in_scope(&*document, old) || self.in_scope(&*document, new)
            }
            DocumentChange::PropertyChanged(property) => self.in_scope(&*document, &property.node),
            DocumentChange::TerminalChanged { root } => *root == self.root,
            DocumentChange::Reloaded => true,
        }
    }

    fn apply_external_selection(&mut self, paths: Vec<DocPath>) {
        let nodes: IndexSet<NodeId> = paths
            .into_iter()
            .map(NodeId::new)
            .filter(|id| self.nodes.contains_key(id))
            .collect();
        if nodes == self.selection.nodes {
            return;
        }
        self.selection.nodes = nodes;
        self.events.emit(GraphEvent::SelectionChanged(self.selection.clone()));
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    fn transaction<T>(
        &self,
        label: &str,
        edit: impl FnOnce(&mut dyn DocumentAdapter) -> DocumentResult<T>,
    ) -> Result<T> {
        let guard = TransactionGuard::begin(&self.document, label)?;
        let mut document = self.document.borrow_mut();
        let result = edit(&mut *document);
        drop(document);
        match result {
            Ok(value) => {
                guard.commit()?;
                Ok(value)
            }
            Err(e @ (DocumentError::NodeNotFound(_) | DocumentError::PropertyNotFound(_))) => {
                tracing::debug!("{} hit a stale reference: {}", label, e);
                guard.rollback();
                Err(GraphError::Consistency(e.to_string()))
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", label, e);
                guard.rollback();
                Err(e.into())
            }
        }
    }

    /// Set the selection from the scene and mirror it to the selection
    /// service
    pub fn on_selection_set(&mut self, selection: Selection) {
        let mut selection = selection;
        selection.nodes.retain(|id| self.nodes.contains_key(id));
        selection.connections.retain(|id| self.connections.contains(id));
        if selection == self.selection {
            return;
        }
        self.selection = selection;
        let paths = self.selection.nodes.iter().map(|id| id.path().clone()).collect();
        self.selection_service.borrow_mut().set_selected_paths(paths);
        self.events.emit(GraphEvent::SelectionChanged(self.selection.clone()));
    }

    /// Offset the layout position of `ids` by `delta`
    pub fn on_nodes_moved(&mut self, ids: &[NodeId], delta: [f32; 2]) -> Result<()> {
        let ids: Vec<&NodeId> = ids.iter().filter(|id| self.nodes.contains_key(*id)).collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.transaction("Move nodes", |document| {
            for id in ids {
                let Some(node) = document.get_node(id.path()) else {
                    tracing::debug!("Skipping move of stale node {}", id);
                    continue;
                };
                let mut metadata = node.metadata;
                metadata.position[0] += delta[0];
                metadata.position[1] += delta[1];
                document.set_metadata(id.path(), metadata)?;
            }
            Ok(())
        })
    }

    /// Rename a node; returns the id under its new name.
    ///
    /// A node that no longer exists is left alone and `None` is returned.
    pub fn rename(&mut self, id: &NodeId, new_name: &str) -> Result<Option<NodeId>> {
        if !is_valid_name(new_name) {
            return Err(ValidationError::InvalidName(new_name.to_string()).into());
        }
        if !self.nodes.contains_key(id) {
            tracing::debug!("Ignoring rename of stale node {}", id);
            return Ok(None);
        }
        self.require_live_node(id)?;
        if id.name() == new_name {
            return Ok(Some(id.clone()));
        }
        let Some(parent) = id.path().parent() else {
            return Ok(None);
        };
        let collides = self
            .document
            .borrow()
            .get_node(&parent)
            .is_some_and(|node| node.has_child(new_name));
        if collides {
            return Err(ValidationError::NameCollision(new_name.to_string()).into());
        }

        let renamed = self.transaction("Rename node", |document| document.rename_node(id.path(), new_name))?;
        Ok(Some(NodeId::new(renamed)))
    }

    /// Flip the bypass flag of a node. Connections are kept.
    pub fn toggle_node_bypass(&mut self, id: &NodeId) -> Result<()> {
        if !self.policy.supports_bypass() {
            return Err(ValidationError::UnsupportedOperation("bypass").into());
        }
        if !self.nodes.contains_key(id) {
            tracing::debug!("Ignoring bypass of stale node {}", id);
            return Ok(());
        }
        self.transaction("Toggle bypass", |document| {
            let Some(node) = document.get_node(id.path()) else {
                return Ok(());
            };
            let mut metadata = node.metadata;
            metadata.bypass = !metadata.bypass;
            document.set_metadata(id.path(), metadata)
        })
    }

    /// Remove connections, then nodes (with their connections), in one
    /// transaction
    pub fn remove(&mut self, node_ids: &[NodeId], connection_ids: &[ConnectionId]) -> Result<()> {
        let root = self.require_root()?.clone();
        let mut connections: IndexSet<&ConnectionId> = connection_ids
            .iter()
            .filter(|id| self.connections.contains(*id))
            .collect();
        let nodes: Vec<&NodeId> = node_ids.iter().filter(|id| self.nodes.contains_key(*id)).collect();
        for id in &nodes {
            connections.extend(self.connections.iter().filter(|c| c.involves_node(id)));
        }
        if connections.is_empty() && nodes.is_empty() {
            return Ok(());
        }

        self.transaction("Delete", |document| {
            for connection in connections {
                if document.get_node(connection.end_node().path()).is_some() {
                    document.remove_connection(&connection.end.property_path(), &connection.start.property_path())?;
                }
            }
            for id in nodes {
                if document.get_node(id.path()).is_none() {
                    continue;
                }
                if document.get_terminal(&root).is_some_and(|terminal| terminal.has_prefix(id.path())) {
                    document.set_terminal(&root, None)?;
                }
                document.remove_node(id.path())?;
            }
            Ok(())
        })
    }

    /// Whether double-clicking `id` enters it as a subgraph
    pub fn can_fall_through(&self, id: &NodeId) -> bool {
        *id.path() != self.root
            && self
                .nodes
                .get(id)
                .is_some_and(|node| self.policy.is_navigable(&node.type_name))
    }

    /// Designated output node of the current graph
    pub fn get_terminal_node(&self) -> Option<&NodeId> {
        self.terminal.as_ref()
    }

    /// Designate (or clear) the terminal node
    pub fn set_terminal_node(&mut self, id: Option<&NodeId>) -> Result<()> {
        if !self.policy.supports_terminal() {
            return Err(ValidationError::UnsupportedOperation("terminal node").into());
        }
        let root = self.require_root()?.clone();
        if let Some(id) = id {
            if *id.path() == root || !id.path().has_prefix(&root) || !self.nodes.contains_key(id) {
                return Err(ValidationError::TerminalOutsideRoot(id.clone()).into());
            }
            self.require_live_node(id)?;
        }
        self.transaction("Set terminal node", |document| {
            document.set_terminal(&root, id.map(NodeId::path))
        })
    }

    /// First free name `{base}{n}` among the root's children
    fn unique_name(&self, base: &str) -> String {
        let siblings = self
            .document
            .borrow()
            .get_node(&self.root)
            .map(|node| node.children)
            .unwrap_or_default();
        let base = if is_valid_name(base) { base } else { "Node" };
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|name| !siblings.contains(name))
            .unwrap_or_else(|| base.to_string())
    }

    fn author_node(
        &mut self,
        label: &str,
        base_name: &str,
        type_name: &str,
        properties: Vec<Property>,
        position: [f32; 2],
    ) -> Result<NodeId> {
        let root = self.require_root()?.clone();
        let name = self.unique_name(base_name);
        let path = root
            .child(&name)
            .map_err(|_| ValidationError::InvalidName(name.clone()))?;

        self.transaction(label, |document| {
            document.create_node(&path, type_name)?;
            for property in properties {
                document.create_property(&path, property)?;
            }
            let Some(node) = document.get_node(&path) else {
                return Ok(());
            };
            let mut metadata = node.metadata;
            metadata.position = position;
            document.set_metadata(&path, metadata)
        })?;
        tracing::debug!("Created {} node {}", type_name, path);
        Ok(NodeId::new(path))
    }

    /// Create a catalog node with its ports under the root
    pub fn create_node(&mut self, type_name: &str, position: [f32; 2]) -> Result<NodeId> {
        let node_type = self
            .policy
            .catalog()
            .get(type_name)
            .filter(|_| self.policy.supports_type(type_name))
            .cloned()
            .ok_or_else(|| ValidationError::UnsupportedNodeType(type_name.to_string()))?;
        let properties = node_type.ports().map(PortTemplate::to_property).collect();
        self.author_node("Create node", &node_type.name, &node_type.id, properties, position)
    }

    /// Create a node of any accepted type, without catalog ports
    pub fn create_typed_node(&mut self, type_name: &str, position: [f32; 2]) -> Result<NodeId> {
        if !self.policy.supports_type(type_name) {
            return Err(ValidationError::UnsupportedNodeType(type_name.to_string()).into());
        }
        self.author_node("Create node", type_name, type_name, Vec::new(), position)
    }

    /// Create a shader node for `shader_id` (shading graphs only)
    pub fn create_shader_node(&mut self, shader_id: &str, position: [f32; 2]) -> Result<NodeId> {
        if self.policy.kind() != GraphKind::Shading {
            return Err(ValidationError::UnsupportedOperation("shader nodes").into());
        }
        let shader = self
            .policy
            .catalog()
            .get(shader_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnsupportedNodeType(shader_id.to_string()))?;
        let mut properties = vec![Property::new(SHADER_ID_PROPERTY, "token")
            .with_value(PropertyValue::Token(shader.id.clone()))];
        properties.extend(shader.ports().map(PortTemplate::to_property));
        self.author_node("Create shader", &shader.name, SHADER_TYPE, properties, position)
    }

    /// Validate a connection between two ports, in either order.
    ///
    /// Returns the normalized id (output first).
    pub fn can_connect(&self, a: &PortId, b: &PortId) -> Result<ConnectionId> {
        let first = self
            .ports
            .get(a)
            .ok_or_else(|| GraphError::Consistency(format!("unknown port {a}")))?;
        let second = self
            .ports
            .get(b)
            .ok_or_else(|| GraphError::Consistency(format!("unknown port {b}")))?;
        let (output, input) = match (first.direction(), second.direction()) {
            (PortDirection::Output, PortDirection::Input) => (first, second),
            (PortDirection::Input, PortDirection::Output) => (second, first),
            _ => {
                return Err(ValidationError::IncompatibleConnection {
                    start: a.clone(),
                    end: b.clone(),
                }
                .into())
            }
        };
        if output.id.node == input.id.node {
            return Err(ValidationError::SelfLoop(output.id.node.clone()).into());
        }
        let id = ConnectionId::new(output.id.clone(), input.id.clone());
        if self.connections.contains(&id) {
            return Err(ValidationError::DuplicateConnection {
                start: id.start,
                end: id.end,
            }
            .into());
        }
        if !self.policy.ports_compatible(&output.port_type, &input.port_type) {
            return Err(ValidationError::IncompatibleConnection {
                start: id.start,
                end: id.end,
            }
            .into());
        }
        Ok(id)
    }

    /// Connect two ports. A single-connect input loses its current source.
    pub fn connect(&mut self, a: &PortId, b: &PortId) -> Result<ConnectionId> {
        let id = self.can_connect(a, b)?;
        self.require_live_port(&id.start)?;
        self.require_live_port(&id.end)?;
        let replaces_source = self.ports.get(&id.end).is_some_and(|port| !port.multi_connect);
        let target = id.end.property_path();
        let source = id.start.property_path();
        self.transaction("Connect", |document| {
            if replaces_source {
                let existing = document
                    .get_node(&target.node)
                    .and_then(|node| node.property(&target.name).map(|p| p.connections.clone()))
                    .unwrap_or_default();
                for old in existing {
                    document.remove_connection(&target, &old)?;
                }
            }
            document.add_connection(&target, &source)
        })?;
        tracing::debug!("Connected {}", id);
        Ok(id)
    }

    /// Move `ids` into a new node graph under the root, in one transaction.
    ///
    /// Connections among the grouped nodes are kept. A connection crossing
    /// the group boundary is split at an interface property of the node
    /// graph: an `inputs:` property for a source outside the group, an
    /// `outputs:` property for a consumer outside it. A terminal inside the
    /// group moves to the node graph.
    pub fn group_into_node_graph(&mut self, ids: &[NodeId]) -> Result<NodeId> {
        if self.policy.kind() != GraphKind::Shading || !self.policy.supports_type(NODE_GRAPH_TYPE) {
            return Err(ValidationError::UnsupportedOperation("grouping").into());
        }
        let root = self.require_root()?.clone();
        let members: IndexSet<&NodeId> = ids
            .iter()
            .filter(|id| self.nodes.contains_key(*id) && id.path().parent().as_ref() == Some(&root))
            .collect();
        if members.is_empty() {
            return Err(ValidationError::NothingToGroup.into());
        }
        for id in &members {
            self.require_live_node(id)?;
        }

        let positions: Vec<[f32; 2]> = members
            .iter()
            .filter_map(|id| self.nodes.get(*id))
            .map(|node| node.position)
            .collect();
        let count = positions.len().max(1) as f32;
        let position = positions
            .iter()
            .fold([0.0, 0.0], |sum, p| [sum[0] + p[0] / count, sum[1] + p[1] / count]);

        let name = self.unique_name(NODE_GRAPH_TYPE);
        let group = root
            .child(&name)
            .map_err(|_| ValidationError::InvalidName(name.clone()))?;

        self.transaction("Group into node graph", |document| {
            let moves = members
                .iter()
                .map(|id| Ok((id.path().clone(), group.child(id.name())?)))
                .collect::<DocumentResult<Vec<_>>>()?;
            let mut interface = GroupInterface::new(group.clone(), moves);

            document.create_node(&group, NODE_GRAPH_TYPE)?;
            if let Some(node) = document.get_node(&group) {
                let mut metadata = node.metadata;
                metadata.position = position;
                document.set_metadata(&group, metadata)?;
            }
            for (from, to) in interface.moves.clone() {
                interface.copy_subtree(document, &from, &to)?;
            }

            let mut outside = Vec::new();
            interface.collect_outside(document, &root, &mut outside);
            for node in outside {
                for property in node.properties.values() {
                    let target = PropertyPath::new(node.path.clone(), property.name.clone());
                    for source in &property.connections {
                        if interface.retarget(&source.node).is_none() {
                            continue;
                        }
                        let output = interface.output_for(document, source)?;
                        document.remove_connection(&target, source)?;
                        document.add_connection(&target, &output)?;
                    }
                }
            }

            let terminal = document.get_terminal(&root);
            if terminal.is_some_and(|terminal| interface.retarget(&terminal).is_some()) {
                document.set_terminal(&root, Some(&group))?;
            }
            for (from, _) in &interface.moves {
                document.remove_node(from)?;
            }
            Ok(())
        })?;
        tracing::debug!("Grouped {} nodes into {}", members.len(), group);
        Ok(NodeId::new(group))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Identity of this model instance
    pub fn token(&self) -> ModelToken {
        self.token
    }

    /// Graph kind of the active policy
    pub fn kind(&self) -> GraphKind {
        self.policy.kind()
    }

    /// Active policy
    pub fn policy(&self) -> &Rc<dyn GraphPolicy> {
        &self.policy
    }

    /// Document handle
    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    /// Selection service handle
    pub fn selection_service(&self) -> &SelectionHandle {
        &self.selection_service
    }

    /// Nodes in scan order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.values()
    }

    /// Node by id
    pub fn node(&self, id: &NodeId) -> Option<&NodeDescriptor> {
        self.nodes.get(id)
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Ports of one node, in property order
    pub fn ports_for_node<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a PortDescriptor> + 'a {
        self.ports.values().filter(move |port| port.id.node == *id)
    }

    /// Port by id
    pub fn port(&self, id: &PortId) -> Option<&PortDescriptor> {
        self.ports.get(id)
    }

    /// Every port
    pub fn ports(&self) -> impl Iterator<Item = &PortDescriptor> {
        self.ports.values()
    }

    /// Every connection
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionId> {
        self.connections.iter()
    }

    /// Whether a connection exists
    pub fn has_connection(&self, id: &ConnectionId) -> bool {
        self.connections.contains(id)
    }

    /// Connections touching a node
    pub fn connections_for_node<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a ConnectionId> + 'a {
        self.connections.iter().filter(move |connection| connection.involves_node(id))
    }

    /// Current selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Take queued events
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        self.events.drain()
    }

    /// Event bus, for registering observers
    pub fn events_mut(&mut self) -> &mut EventBus<GraphEvent> {
        &mut self.events
    }

    /// Hover text for a node
    pub fn node_info_text(&self, id: &NodeId) -> Option<String> {
        self.nodes
            .get(id)
            .map(|node| format!("{} {} node", node.name, node.type_name))
    }

    /// Hover text for a port
    pub fn port_info_text(&self, port: &PortId) -> String {
        port_description(port)
    }

    /// Hover text for a connection
    pub fn connection_info_text(&self, id: &ConnectionId) -> String {
        connection_description(id)
    }
}

/// Description of a port, derived from its id alone
pub fn port_description(port: &PortId) -> String {
    format!("{} ({}) port", port.short_name(), port.direction.label())
}

/// Description of a connection, derived from its id alone
pub fn connection_description(id: &ConnectionId) -> String {
    format!(
        "Connection {} ({}) -> {} ({})",
        id.start.node.name(),
        id.start.short_name(),
        id.end.node.name(),
        id.end.short_name()
    )
}

/// Boundary bookkeeping while nodes move into a node graph
struct GroupInterface {
    group: DocPath,
    moves: Vec<(DocPath, DocPath)>,
    /// Outside source -> interface input
    inputs: IndexMap<PropertyPath, PropertyPath>,
    /// Grouped source (old path) -> interface output
    outputs: IndexMap<PropertyPath, PropertyPath>,
}

impl GroupInterface {
    fn new(group: DocPath, moves: Vec<(DocPath, DocPath)>) -> Self {
        Self {
            group,
            moves,
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// New path of `path` if it lies in a grouped subtree
    fn retarget(&self, path: &DocPath) -> Option<DocPath> {
        self.moves.iter().find_map(|(from, to)| path.replace_prefix(from, to))
    }

    fn copy_subtree(&mut self, document: &mut dyn DocumentAdapter, from: &DocPath, to: &DocPath) -> DocumentResult<()> {
        let node = document
            .get_node(from)
            .ok_or_else(|| DocumentError::NodeNotFound(from.clone()))?;
        document.create_node(to, &node.type_name)?;
        for property in node.properties.values() {
            let mut copy = property.clone();
            copy.connections.clear();
            for source in &property.connections {
                let source = match self.retarget(&source.node) {
                    Some(moved) => PropertyPath::new(moved, source.name.clone()),
                    None => self.input_for(document, source, &property.type_name)?,
                };
                copy.connections.push(source);
            }
            document.create_property(to, copy)?;
        }
        document.set_metadata(to, node.metadata)?;

        for child in document.get_children(from) {
            self.copy_subtree(document, &child.path, &to.child(child.name())?)?;
        }
        if let Some(terminal) = document.get_terminal(from).and_then(|t| self.retarget(&t)) {
            document.set_terminal(to, Some(&terminal))?;
        }
        Ok(())
    }

    /// Interface input fed by `source`, authored on first use
    fn input_for(
        &mut self,
        document: &mut dyn DocumentAdapter,
        source: &PropertyPath,
        type_name: &str,
    ) -> DocumentResult<PropertyPath> {
        if let Some(existing) = self.inputs.get(source) {
            return Ok(existing.clone());
        }
        let mut property = Property::new(self.interface_name(document, "inputs", source), type_name);
        property.connections.push(source.clone());
        let input = PropertyPath::new(self.group.clone(), property.name.clone());
        document.create_property(&self.group, property)?;
        self.inputs.insert(source.clone(), input.clone());
        Ok(input)
    }

    /// Interface output reading the grouped `source`, authored on first use
    fn output_for(&mut self, document: &mut dyn DocumentAdapter, source: &PropertyPath) -> DocumentResult<PropertyPath> {
        if let Some(existing) = self.outputs.get(source) {
            return Ok(existing.clone());
        }
        let moved = self
            .retarget(&source.node)
            .ok_or_else(|| DocumentError::NodeNotFound(source.node.clone()))?;
        let inner = PropertyPath::new(moved, source.name.clone());
        let type_name = document
            .get_node(&inner.node)
            .and_then(|node| node.property(&inner.name).map(|p| p.type_name.clone()))
            .ok_or_else(|| DocumentError::PropertyNotFound(inner.clone()))?;

        let mut property = Property::new(self.interface_name(document, "outputs", source), type_name);
        property.connections.push(inner);
        let output = PropertyPath::new(self.group.clone(), property.name.clone());
        document.create_property(&self.group, property)?;
        self.outputs.insert(source.clone(), output.clone());
        Ok(output)
    }

    /// `{namespace}:{node}_{port}`, suffixed until free on the node graph
    fn interface_name(&self, document: &dyn DocumentAdapter, namespace: &str, source: &PropertyPath) -> String {
        let port = source.name.rsplit(':').next().unwrap_or_default();
        let base = format!("{namespace}:{}_{port}", source.node.name());
        let taken = |name: &str| {
            document
                .get_node(&self.group)
                .is_some_and(|node| node.property(name).is_some())
        };
        if !taken(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.clone())
    }

    /// `container` and its descendants, skipping grouped subtrees and the
    /// node graph itself
    fn collect_outside(&self, document: &dyn DocumentAdapter, container: &DocPath, out: &mut Vec<DocumentNode>) {
        let Some(node) = document.get_node(container) else {
            return;
        };
        out.push(node);
        for child in document.get_children(container) {
            if child.path.has_prefix(&self.group) || self.retarget(&child.path).is_some() {
                continue;
            }
            self.collect_outside(document, &child.path, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{path, Fixture};
    use nodeweave_document::{DocumentError, SelectionService};

    fn node(s: &str) -> NodeId {
        NodeId::new(path(s))
    }

    fn port(node_path: &str, property: &str) -> PortId {
        PortId::new(node(node_path), property)
    }

    fn procedural_model(fixture: &Fixture) -> GraphModel {
        let mut model = GraphModel::with_kind(
            fixture.handle.clone(),
            fixture.selection_handle.clone(),
            GraphKind::Procedural,
        );
        model.set_root(&path("/Graph1")).unwrap();
        model.drain_events();
        model
    }

    fn names(model: &GraphModel) -> Vec<String> {
        model.nodes().map(|node| node.name.clone()).collect()
    }

    fn assert_no_dangling(model: &GraphModel) {
        for connection in model.connections() {
            assert!(model.port(&connection.start).is_some(), "{connection} has no start port");
            assert!(model.port(&connection.end).is_some(), "{connection} has no end port");
        }
    }

    #[test]
    fn test_set_root_scans_one_level() {
        let fixture = Fixture::procedural();
        let mut model = GraphModel::with_kind(
            fixture.handle.clone(),
            fixture.selection_handle.clone(),
            GraphKind::Procedural,
        );
        model.set_root(&path("/Graph1")).unwrap();

        assert_eq!(model.get_root(), &path("/Graph1"));
        assert_eq!(names(&model), vec!["Add1", "Add2", "Render1", "Group1", "Material1"]);
        assert_eq!(model.drain_events(), vec![GraphEvent::ModelReset]);

        let render = model.node(&node("/Graph1/Scope1/Render1")).unwrap();
        assert_eq!(render.group, Some(node("/Graph1/Scope1")));
        assert!(render.supported);
        assert!(!model.node(&node("/Graph1/Group1")).unwrap().supported);

        assert_eq!(model.ports_for_node(&node("/Graph1/Add1")).count(), 3);
        assert_eq!(model.connections().count(), 1);
        assert_no_dangling(&model);
    }

    #[test]
    fn test_invalid_root_keeps_state() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);

        let err = model.set_root(&path("/Graph1/Add1")).unwrap_err();
        assert!(matches!(err, GraphError::Validation(ValidationError::InvalidRoot(_))));
        assert!(model.set_root(&path("/Missing")).is_err());
        assert_eq!(model.get_root(), &path("/Graph1"));
        assert_eq!(model.node_count(), 5);
        assert!(model.drain_events().is_empty());
    }

    #[test]
    fn test_empty_root_clears() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        model.set_root(&DocPath::empty()).unwrap();

        assert!(model.get_root().is_empty());
        assert_eq!(model.node_count(), 0);
        assert_eq!(model.ports().count(), 0);
        assert_eq!(model.connections().count(), 0);
        assert_eq!(model.drain_events(), vec![GraphEvent::ModelReset]);
    }

    #[test]
    fn test_create_node_emits_one_created() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let before = fixture.handle.borrow().transaction_count();

        let id = model.create_node("Add", [10.0, 20.0]).unwrap();
        assert_eq!(id, node("/Graph1/Add3"));
        assert_eq!(fixture.handle.borrow().transaction_count(), before + 1);
        assert!(model.drain_events().is_empty());

        assert!(model.sync());
        assert_eq!(model.drain_events(), vec![GraphEvent::NodeCreated(id.clone())]);
        let created = fixture.handle.borrow().get_node(id.path()).unwrap();
        assert_eq!(created.type_name, "Add");
        assert_eq!(created.metadata.position, [10.0, 20.0]);
        assert_eq!(model.ports_for_node(&id).count(), 3);
    }

    #[test]
    fn test_create_rejects_unknown_type() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let before = fixture.handle.borrow().transaction_count();

        let err = model.create_node("Teleport", [0.0, 0.0]).unwrap_err();
        assert!(matches!(err, GraphError::Validation(ValidationError::UnsupportedNodeType(_))));
        assert!(model.create_shader_node("PreviewSurface", [0.0, 0.0]).is_err());
        assert_eq!(fixture.handle.borrow().transaction_count(), before);

        let backdrop = model.create_typed_node("Backdrop", [0.0, 0.0]).unwrap();
        assert_eq!(backdrop, node("/Graph1/Backdrop1"));
    }

    #[test]
    fn test_toggle_bypass_twice_restores() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let add = node("/Graph1/Add2");

        model.toggle_node_bypass(&add).unwrap();
        model.sync();
        assert!(model.node(&add).unwrap().bypassed);
        assert_eq!(model.drain_events(), vec![GraphEvent::NodeUpdated(add.clone())]);
        assert_eq!(model.connections_for_node(&add).count(), 1);

        model.toggle_node_bypass(&add).unwrap();
        model.sync();
        assert!(!model.node(&add).unwrap().bypassed);
    }

    #[test]
    fn test_connect_then_remove_round_trip() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let before: Vec<ConnectionId> = model.connections().cloned().collect();

        // Input first: the model normalizes to output -> input.
        let id = model
            .connect(&port("/Graph1/Add2", "inputs:b"), &port("/Graph1/Add1", "outputs:out"))
            .unwrap();
        assert_eq!(id.start, port("/Graph1/Add1", "outputs:out"));
        model.sync();
        assert_eq!(model.drain_events(), vec![GraphEvent::ConnectionCreated(id.clone())]);
        assert_no_dangling(&model);

        model.remove(&[], &[id.clone()]).unwrap();
        model.sync();
        assert_eq!(model.drain_events(), vec![GraphEvent::ConnectionRemoved(id)]);
        let after: Vec<ConnectionId> = model.connections().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_single_connect_input_replaces_source() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let add3 = model.create_node("Add", [0.0, 0.0]).unwrap();
        model.sync();

        let target = port("/Graph1/Add2", "inputs:a");
        model.connect(&PortId::new(add3, "outputs:out"), &target).unwrap();
        model.sync();

        let sources: Vec<&ConnectionId> = model.connections().filter(|c| c.end == target).collect();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].start.node, node("/Graph1/Add3"));
    }

    #[test]
    fn test_can_connect_rejections() {
        let fixture = Fixture::procedural();
        let model = procedural_model(&fixture);
        let out = port("/Graph1/Add1", "outputs:out");

        let same_direction = model.can_connect(&out, &port("/Graph1/Add2", "outputs:out"));
        assert!(matches!(
            same_direction,
            Err(GraphError::Validation(ValidationError::IncompatibleConnection { .. }))
        ));
        let self_loop = model.can_connect(&out, &port("/Graph1/Add1", "inputs:a"));
        assert!(matches!(self_loop, Err(GraphError::Validation(ValidationError::SelfLoop(_)))));
        let duplicate = model.can_connect(&out, &port("/Graph1/Add2", "inputs:a"));
        assert!(matches!(
            duplicate,
            Err(GraphError::Validation(ValidationError::DuplicateConnection { .. }))
        ));
        let wrong_type = model.can_connect(&out, &port("/Graph1/Scope1/Render1", "inputs:in"));
        assert!(matches!(
            wrong_type,
            Err(GraphError::Validation(ValidationError::IncompatibleConnection { .. }))
        ));
        let stale = model.can_connect(&out, &port("/Graph1/Gone", "inputs:a"));
        assert!(stale.unwrap_err().is_consistency());
    }

    #[test]
    fn test_rename_validation() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let add = node("/Graph1/Add1");

        let collision = model.rename(&add, "Add2").unwrap_err();
        assert!(matches!(collision, GraphError::Validation(ValidationError::NameCollision(_))));
        let invalid = model.rename(&add, "not valid").unwrap_err();
        assert!(matches!(invalid, GraphError::Validation(ValidationError::InvalidName(_))));
        assert_eq!(model.rename(&node("/Graph1/Gone"), "Other").unwrap(), None);

        let renamed = model.rename(&add, "Source").unwrap();
        assert_eq!(renamed, Some(node("/Graph1/Source")));
        model.sync();
        assert!(model.node(&node("/Graph1/Source")).is_some());
        assert!(model.node(&add).is_none());
        assert_eq!(model.connections().count(), 1);
        assert_no_dangling(&model);
    }

    #[test]
    fn test_undo_removal_restores_through_events() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let add1 = node("/Graph1/Add1");

        model.remove(&[add1.clone()], &[]).unwrap();
        model.sync();
        let events = model.drain_events();
        assert!(matches!(events[0], GraphEvent::ConnectionRemoved(_)));
        assert!(events.contains(&GraphEvent::NodeRemoved(add1.clone())));
        assert_eq!(model.connections().count(), 0);

        fixture.handle.borrow_mut().undo().unwrap();
        model.sync();
        let events = model.drain_events();
        assert!(!events.contains(&GraphEvent::ModelReset));
        assert!(events.contains(&GraphEvent::NodeCreated(add1.clone())));
        assert!(events.iter().any(|e| matches!(e, GraphEvent::ConnectionCreated(_))));
        assert_eq!(model.node_count(), 5);
        assert_eq!(model.connections().count(), 1);
    }

    #[test]
    fn test_external_root_removal_empties_model() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);

        fixture
            .document
            .borrow_mut()
            .edit("external", |doc| doc.remove_node(&path("/Graph1")))
            .unwrap();
        model.sync();

        assert!(model.get_root().is_empty());
        assert_eq!(model.node_count(), 0);
        assert_eq!(model.drain_events(), vec![GraphEvent::ModelReset]);
    }

    #[test]
    fn test_ancestor_rename_reroots() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        model.set_root(&path("/Graph1/Group1")).unwrap();
        model.drain_events();

        fixture
            .document
            .borrow_mut()
            .edit("external", |doc| doc.rename_node(&path("/Graph1"), "Main"))
            .unwrap();
        model.sync();

        assert_eq!(model.get_root(), &path("/Main/Group1"));
        assert!(model.node(&node("/Main/Group1/Multiply1")).is_some());
        assert!(model.drain_events().contains(&GraphEvent::ModelReset));
    }

    #[test]
    fn test_read_only_document_rejects_writes() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        fixture.document.borrow_mut().set_read_only(true);

        let err = model.create_node("Add", [0.0, 0.0]).unwrap_err();
        assert!(matches!(err, GraphError::Transaction(DocumentError::ReadOnly(_))));
        assert!(!fixture.handle.borrow().in_transaction());
        assert!(!model.sync());
        assert!(model.drain_events().is_empty());
        assert_eq!(model.node_count(), 5);
    }

    #[test]
    fn test_terminal_node() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let render = node("/Graph1/Scope1/Render1");

        model.set_terminal_node(Some(&render)).unwrap();
        model.sync();
        assert_eq!(model.get_terminal_node(), Some(&render));
        assert_eq!(model.drain_events(), vec![GraphEvent::TerminalNodeChanged(Some(render.clone()))]);

        let outside = model.set_terminal_node(Some(&node("/Other/Node"))).unwrap_err();
        assert!(matches!(outside, GraphError::Validation(ValidationError::TerminalOutsideRoot(_))));

        model.remove(&[render], &[]).unwrap();
        model.sync();
        assert_eq!(model.get_terminal_node(), None);
    }

    #[test]
    fn test_terminal_must_be_a_node_of_the_graph() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let before = fixture.handle.borrow().transaction_count();

        let nested = model.set_terminal_node(Some(&node("/Graph1/Group1/Multiply1"))).unwrap_err();
        assert!(matches!(nested, GraphError::Validation(ValidationError::TerminalOutsideRoot(_))));
        assert_eq!(fixture.handle.borrow().transaction_count(), before);
        assert_eq!(fixture.handle.borrow().get_terminal(&path("/Graph1")), None);
    }

    #[test]
    fn test_stale_ids_are_consistency_errors() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let add2 = node("/Graph1/Add2");
        fixture
            .document
            .borrow_mut()
            .edit("external", |doc| doc.remove_node(add2.path()))
            .unwrap();
        let stats = fixture.document.borrow().stats();

        let connect = model.connect(&port("/Graph1/Add1", "outputs:out"), &port("/Graph1/Add2", "inputs:b"));
        assert!(connect.unwrap_err().is_consistency());
        assert!(model.rename(&add2, "Other").unwrap_err().is_consistency());
        assert!(model.set_terminal_node(Some(&add2)).unwrap_err().is_consistency());

        assert_eq!(fixture.document.borrow().stats(), stats);
        assert!(!fixture.handle.borrow().in_transaction());

        model.sync();
        assert!(model.node(&add2).is_none());
        assert_no_dangling(&model);
    }

    fn shading_model(fixture: &Fixture) -> GraphModel {
        let mut model = GraphModel::with_kind(
            fixture.handle.clone(),
            fixture.selection_handle.clone(),
            GraphKind::Shading,
        );
        model.set_root(&path("/Graph1/Material1")).unwrap();
        model.drain_events();
        model
    }

    #[test]
    fn test_group_into_node_graph_splits_boundary_connections() {
        let fixture = Fixture::procedural();
        let material = path("/Graph1/Material1");
        let rgb = PropertyPath::new(path("/Graph1/Material1/Texture1"), "outputs:rgb");
        let surface = PropertyPath::new(path("/Graph1/Material1/Surface1"), "outputs:surface");
        let material_out = PropertyPath::new(material.clone(), "outputs:surface");
        fixture
            .document
            .borrow_mut()
            .edit("wire", |doc| {
                doc.add_connection(&PropertyPath::new(path("/Graph1/Material1/Surface1"), "inputs:diffuseColor"), &rgb)?;
                doc.add_connection(&material_out, &surface)?;
                doc.set_terminal(&material, Some(&path("/Graph1/Material1/Surface1")))
            })
            .unwrap();
        let mut model = shading_model(&fixture);
        let transactions = fixture.document.borrow().transaction_count();

        let group = model.group_into_node_graph(&[node("/Graph1/Material1/Surface1")]).unwrap();
        assert_eq!(group, node("/Graph1/Material1/NodeGraph1"));
        assert_eq!(fixture.document.borrow().transaction_count(), transactions + 1);

        {
            let document = fixture.document.borrow();
            assert!(!document.contains(&path("/Graph1/Material1/Surface1")));
            let inner = document.get_node(&path("/Graph1/Material1/NodeGraph1/Surface1")).unwrap();
            assert_eq!(inner.type_name, SHADER_TYPE);
            assert!(inner.property(SHADER_ID_PROPERTY).is_some());
            assert_eq!(
                inner.property("inputs:diffuseColor").unwrap().connections,
                vec![PropertyPath::new(group.path().clone(), "inputs:Texture1_rgb")]
            );

            let graph = document.get_node(group.path()).unwrap();
            assert_eq!(graph.property("inputs:Texture1_rgb").unwrap().connections, vec![rgb]);
            assert_eq!(
                graph.property("outputs:Surface1_surface").unwrap().connections,
                vec![PropertyPath::new(inner.path.clone(), "outputs:surface")]
            );
            let material_node = document.get_node(&material).unwrap();
            assert_eq!(
                material_node.property("outputs:surface").unwrap().connections,
                vec![PropertyPath::new(group.path().clone(), "outputs:Surface1_surface")]
            );
            assert_eq!(document.get_terminal(&material), Some(group.path().clone()));
        }

        model.sync();
        assert_eq!(names(&model), vec!["Texture1", "NodeGraph1"]);
        assert!(model.has_connection(&ConnectionId::new(
            port("/Graph1/Material1/Texture1", "outputs:rgb"),
            port("/Graph1/Material1/NodeGraph1", "inputs:Texture1_rgb"),
        )));
        assert_eq!(model.get_terminal_node(), Some(&group));
        assert_no_dangling(&model);

        fixture.document.borrow_mut().undo().unwrap();
        model.sync();
        assert_eq!(names(&model), vec!["Surface1", "Texture1"]);
    }

    #[test]
    fn test_group_rejections() {
        let fixture = Fixture::procedural();
        let transactions = fixture.document.borrow().transaction_count();

        let mut procedural = procedural_model(&fixture);
        let err = procedural.group_into_node_graph(&[node("/Graph1/Add1")]).unwrap_err();
        assert!(matches!(err, GraphError::Validation(ValidationError::UnsupportedOperation(_))));

        let mut shading = shading_model(&fixture);
        let err = shading.group_into_node_graph(&[]).unwrap_err();
        assert!(matches!(err, GraphError::Validation(ValidationError::NothingToGroup)));
        let err = shading.group_into_node_graph(&[node("/Graph1/Add1")]).unwrap_err();
        assert!(matches!(err, GraphError::Validation(ValidationError::NothingToGroup)));

        assert_eq!(fixture.document.borrow().transaction_count(), transactions);
    }

    #[test]
    fn test_selection_round_trip() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);
        let add = node("/Graph1/Add1");

        model.on_selection_set(Selection::from_nodes([add.clone(), node("/Graph1/Gone")]));
        assert_eq!(fixture.selection.borrow().selected_paths(), vec![path("/Graph1/Add1")]);
        assert_eq!(model.drain_events().len(), 1);
        model.sync();
        assert!(model.drain_events().is_empty());

        fixture
            .selection
            .borrow_mut()
            .set_selected_paths(vec![path("/Graph1/Add2"), path("/Elsewhere")]);
        model.sync();
        assert_eq!(model.selection().nodes.len(), 1);
        assert!(model.selection().contains_node(&node("/Graph1/Add2")));
    }

    #[test]
    fn test_changes_outside_scope_are_ignored() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);

        fixture
            .document
            .borrow_mut()
            .edit("nested", |doc| {
                doc.create_node(&path("/Graph1/Group1/Add9"), "Add")?;
                doc.create_node(&path("/Graph1/Scope1/Add9"), "Add")
            })
            .unwrap();
        model.sync();

        assert_eq!(model.drain_events(), vec![GraphEvent::NodeCreated(node("/Graph1/Scope1/Add9"))]);
        assert!(model.node(&node("/Graph1/Group1/Add9")).is_none());
    }

    #[test]
    fn test_port_added_to_existing_node() {
        let fixture = Fixture::procedural();
        let mut model = procedural_model(&fixture);

        fixture
            .document
            .borrow_mut()
            .edit("add port", |doc| {
                doc.create_property(&path("/Graph1/Add1"), Property::new("inputs:c", "float"))
            })
            .unwrap();
        model.sync();

        let added = port("/Graph1/Add1", "inputs:c");
        assert_eq!(model.drain_events(), vec![GraphEvent::PortUpdated(added.clone())]);
        assert!(model.port(&added).is_some());
    }

    #[test]
    fn test_shading_model() {
        let fixture = Fixture::procedural();
        let mut model = GraphModel::with_kind(
            fixture.handle.clone(),
            fixture.selection_handle.clone(),
            GraphKind::Shading,
        );
        assert!(model.set_root(&path("/Graph1")).is_err());
        model.set_root(&path("/Graph1/Material1")).unwrap();
        assert_eq!(names(&model), vec!["Surface1", "Texture1"]);
        assert!(model.nodes().all(|node| node.supported));

        let err = model.toggle_node_bypass(&node("/Graph1/Material1/Surface1")).unwrap_err();
        assert!(matches!(err, GraphError::Validation(ValidationError::UnsupportedOperation(_))));

        let id = model.create_shader_node("UVTexture", [0.0, 0.0]).unwrap();
        assert_eq!(id, node("/Graph1/Material1/UVTexture1"));
        model.sync();
        let created = model.node(&id).unwrap();
        assert_eq!(created.type_name, SHADER_TYPE);
        assert!(created.supported);

        let connection = model
            .connect(
                &port("/Graph1/Material1/Texture1", "outputs:rgb"),
                &port("/Graph1/Material1/Surface1", "inputs:diffuseColor"),
            )
            .unwrap();
        model.sync();
        assert!(model.has_connection(&connection));
        assert_eq!(
            model.connection_info_text(&connection),
            "Connection Texture1 (rgb) -> Surface1 (diffuseColor)"
        );
    }

    #[test]
    fn test_info_texts() {
        let fixture = Fixture::procedural();
        let model = procedural_model(&fixture);
        assert_eq!(model.node_info_text(&node("/Graph1/Add1")).as_deref(), Some("Add1 Add node"));
        assert_eq!(model.port_info_text(&port("/Graph1/Add1", "inputs:a")), "a (Input) port");
        assert_eq!(model.port_info_text(&port("/Graph1/Add1", "info:id")), "id (Unknown) port");
    }
}
