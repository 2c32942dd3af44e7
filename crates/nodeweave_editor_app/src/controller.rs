// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor controller: the per-window composition root.
//!
//! The controller owns navigation, creation menus and the notice log. It
//! pumps events between the document, the model and the scene, and turns
//! scene gestures into model operations. Failures of a single gesture end
//! here: they become [`EditorNotice`]s and never propagate further.

use crate::config::EditorConfig;
use crate::menus::{CatalogSource, CreationKind, CreationMenu, MenuProvider, NodeTypeSource};
use crate::navigation::{Breadcrumb, NavigationController, NavigationState};
use nodeweave_document::{DocPath, DocumentAdapter, DocumentHandle, SelectionHandle, SelectionService, TransactionGuard};
use nodeweave_editor_graph::model::{connection_description, port_description};
use nodeweave_editor_graph::{
    ConnectionId, GraphError, GraphModel, GraphScene, HoverTarget, LiveItem, NodeId, PortId, SceneEvent,
};
use serde::Serialize;
use std::time::Duration;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeSeverity {
    /// Informational
    Info,
    /// The request was rejected
    Warning,
    /// The document refused a write
    Error,
}

/// Message for the user about a failed gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorNotice {
    /// Severity
    pub severity: NoticeSeverity,
    /// Message text
    pub message: String,
}

/// Hover description computed from the document; the scene asks for it
/// through its description provider
fn describe(document: &DocumentHandle, target: &HoverTarget) -> Option<String> {
    match target {
        HoverTarget::Node(id) => document
            .borrow()
            .get_node(id.path())
            .map(|node| format!("{} {} node", node.name(), node.type_name)),
        HoverTarget::Port(port) => Some(port_description(port)),
        HoverTarget::Connection(id) => Some(connection_description(id)),
    }
}

/// Per-window editor controller
pub struct EditorController {
    config: EditorConfig,
    document: DocumentHandle,
    selection: SelectionHandle,
    navigation: NavigationController,
    menus: MenuProvider,
    notices: Vec<EditorNotice>,
}

impl EditorController {
    /// Create a controller in the `Empty` state
    pub fn new(document: DocumentHandle, selection: SelectionHandle, config: EditorConfig) -> Self {
        let mut navigation = NavigationController::new(
            document.clone(),
            selection.clone(),
            config.navigation.specialization_types.clone(),
        );
        let describer = document.clone();
        navigation
            .scene_mut()
            .set_description_provider(Box::new(move |target| describe(&describer, target)));

        let sources: Vec<Box<dyn NodeTypeSource>> = vec![Box::new(CatalogSource)];
        let menus = MenuProvider::new(sources, config.menus.extra_types_file.clone());

        tracing::debug!("{} controller created", config.editor.name);
        Self {
            config,
            document,
            selection,
            navigation,
            menus,
            notices: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Configuration
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Document handle
    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    /// Navigation
    pub fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    /// Navigation state
    pub fn state(&self) -> NavigationState {
        self.navigation.state()
    }

    /// Current root
    pub fn root(&self) -> &DocPath {
        self.navigation.root()
    }

    /// Active model
    pub fn model(&self) -> &GraphModel {
        self.navigation.model()
    }

    /// Scene
    pub fn scene(&self) -> &GraphScene {
        self.navigation.scene()
    }

    /// Scene, mutably; gestures queued on it are handled by `process_pending`
    pub fn scene_mut(&mut self) -> &mut GraphScene {
        self.navigation.scene_mut()
    }

    /// Breadcrumbs from the top container to the current root
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.navigation.breadcrumbs()
    }

    /// Description of the hovered item
    pub fn hint_text(&self) -> Option<String> {
        self.navigation.scene().hint_text()
    }

    /// Notices not yet taken
    pub fn notices(&self) -> &[EditorNotice] {
        &self.notices
    }

    /// Take and clear the notices
    pub fn take_notices(&mut self) -> Vec<EditorNotice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, severity: NoticeSeverity, message: String) {
        self.notices.push(EditorNotice { severity, message });
    }

    /// Turn a gesture failure into a notice. Stale references are no-ops.
    fn report<T>(&mut self, action: &str, result: nodeweave_editor_graph::Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) if e.is_consistency() => {
                tracing::debug!("{action}: ignoring stale reference: {e}");
                None
            }
            Err(GraphError::Validation(e)) => {
                tracing::warn!("{action} rejected: {e}");
                self.notify(NoticeSeverity::Warning, format!("{action}: {e}"));
                None
            }
            Err(e) => {
                tracing::error!("{action} failed: {e}");
                self.notify(NoticeSeverity::Error, format!("{action}: {e}"));
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Event pump
    // ------------------------------------------------------------------

    /// Run the event loop until nothing is pending. Returns the number of
    /// rounds that did work.
    pub fn process_pending(&mut self) -> usize {
        let max_rounds = self.config.pump.max_iterations.max(1);
        for round in 0..max_rounds {
            let synced = self.navigation.sync();
            let delivered = self.navigation.deliver_model_events();
            let gestures = self.navigation.scene_mut().drain_events();
            if !synced && delivered == 0 && gestures.is_empty() {
                self.poll_menus();
                return round;
            }
            for gesture in gestures {
                self.handle_scene_event(gesture);
            }
        }
        tracing::warn!("Event pump still busy after {max_rounds} rounds");
        self.poll_menus();
        max_rounds
    }

    fn handle_scene_event(&mut self, event: SceneEvent) {
        tracing::debug!("Scene gesture: {:?}", event);
        match event {
            SceneEvent::PortPressed(port) => {
                self.press_port(&port);
            }
            SceneEvent::ConnectionDropped(target) => {
                self.release_on_port(target.as_ref());
            }
            SceneEvent::NodeDoubleClicked(id) => {
                self.enter_node(&id);
            }
            SceneEvent::NodesMoved { ids, delta } => {
                let result = self.navigation.model_mut().on_nodes_moved(&ids, delta);
                self.report("Move", result);
            }
            SceneEvent::NodeRenamed { id, name } => {
                let result = self.navigation.model_mut().rename(&id, &name);
                self.report("Rename", result);
            }
            SceneEvent::SelectionChanged(selection) => self.navigation.model_mut().on_selection_set(selection),
            SceneEvent::PlacementRequested(position) => {
                self.commit_grabber(position);
            }
            SceneEvent::DeleteRequested => self.delete_selected(),
            SceneEvent::CancelRequested => {
                self.cancel();
            }
        }
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Navigate to `path`; the empty path closes the graph
    pub fn navigate_to(&mut self, path: &DocPath) -> bool {
        self.navigation.scene_mut().cancel_grabber();
        let result = self.navigation.set_root(path);
        if self.report("Open graph", result).is_none() {
            return false;
        }
        if self.state() != NavigationState::Empty {
            let kind = self.navigation.kind();
            self.menus.request(kind);
        }
        true
    }

    /// Enter the node if it is a subgraph or a specialized container
    pub fn enter_node(&mut self, id: &NodeId) -> bool {
        if !self.navigation.can_enter(id) {
            return false;
        }
        self.navigate_to(id.path())
    }

    /// Entry screen: create a new top-level graph and open it
    pub fn create_new_graph(&mut self) -> Option<DocPath> {
        let type_name = self.config.editor.entry_graph_type.clone();
        let path = {
            let document = self.document.borrow();
            (1..)
                .filter_map(|n| DocPath::root().child(&format!("{type_name}{n}")).ok())
                .find(|candidate| document.get_node(candidate).is_none())
        }?;

        let created = TransactionGuard::begin(&self.document, "New graph").and_then(|guard| {
            let result = self.document.borrow_mut().create_node(&path, &type_name);
            match result {
                Ok(()) => guard.commit(),
                Err(e) => {
                    guard.rollback();
                    Err(e)
                }
            }
        });
        if let Err(e) = created {
            self.report::<()>("New graph", Err(e.into()));
            return None;
        }
        tracing::info!("Created graph {}", path);
        self.navigate_to(&path).then_some(path)
    }

    /// Entry screen: open the first selected path, or its parent
    pub fn open_selected(&mut self) -> bool {
        let Some(first) = self.selection.borrow().selected_paths().into_iter().next() else {
            self.notify(NoticeSeverity::Info, "Nothing selected to open".to_string());
            return false;
        };
        let candidate = [Some(first.clone()), first.parent()]
            .into_iter()
            .flatten()
            .find(|candidate| self.navigation.can_open(candidate));
        match candidate {
            Some(candidate) => self.navigate_to(&candidate),
            None => {
                self.notify(NoticeSeverity::Warning, format!("No graph can be opened at {first}"));
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Placement and connections
    // ------------------------------------------------------------------

    fn start_placement(&mut self, action: &str, live: nodeweave_editor_graph::Result<LiveItem>) -> bool {
        let Some(live) = self.report(action, live) else {
            return false;
        };
        if let Some(previous) = self.navigation.scene_mut().set_grabber(live) {
            tracing::debug!("Replaced pending placement {}", previous.item_id());
        }
        true
    }

    /// Start placing a catalog node
    pub fn create_node(&mut self, type_name: &str) -> bool {
        let live = self.navigation.registry().make_live_node(self.navigation.model(), type_name);
        self.start_placement("Create node", live)
    }

    /// Start placing a node of an accepted document type
    pub fn create_typed_node(&mut self, type_name: &str) -> bool {
        let live = self
            .navigation
            .registry()
            .make_live_typed_node(self.navigation.model(), type_name);
        self.start_placement("Create node", live)
    }

    /// Start placing a shader node
    pub fn create_shader_node(&mut self, shader_id: &str) -> bool {
        let live = self
            .navigation
            .registry()
            .make_live_shader_node(self.navigation.model(), shader_id);
        self.start_placement("Create shader", live)
    }

    /// Start placing the menu entry `id` of the active menu
    pub fn create_from_menu(&mut self, id: &str) -> bool {
        let Some(entry) = self.menus.menu().and_then(|menu| menu.find(id)).cloned() else {
            self.notify(NoticeSeverity::Warning, format!("'{id}' is not in the creation menu"));
            return false;
        };
        match entry.kind {
            CreationKind::Node => self.create_node(&entry.id),
            CreationKind::Typed => self.create_typed_node(&entry.id),
            CreationKind::Shader => self.create_shader_node(&entry.id),
        }
    }

    /// Commit the pending placement at `position`
    pub fn commit_grabber(&mut self, position: [f32; 2]) -> Option<NodeId> {
        let (model, registry, scene) = self.navigation.parts_mut();
        match scene.take_grabber() {
            Some(LiveItem::Node(live)) => {
                let result = registry.commit_live_node(model, &live, position);
                self.report("Place node", result)
            }
            Some(connection @ LiveItem::Connection(_)) => {
                tracing::debug!("Discarding connection drag {} on placement", connection.item_id());
                None
            }
            None => None,
        }
    }

    /// Position for a node placed without one: right of the rightmost node
    pub fn next_placement(&self) -> [f32; 2] {
        let offset = self.config.placement.offset;
        self.model()
            .nodes()
            .map(|node| node.position)
            .reduce(|a, b| if b[0] > a[0] { b } else { a })
            .map_or([0.0, 0.0], |last| [last[0] + offset[0], last[1] + offset[1]])
    }

    /// Commit the pending placement at [`Self::next_placement`]
    pub fn place_pending(&mut self) -> Option<NodeId> {
        let position = self.next_placement();
        self.commit_grabber(position)
    }

    /// Start a connection drag from `port`
    pub fn press_port(&mut self, port: &PortId) -> bool {
        let live = self
            .navigation
            .registry()
            .make_live_connection(self.navigation.model(), port);
        match live {
            Some(live) => {
                self.navigation.scene_mut().set_grabber(live);
                true
            }
            None => {
                tracing::debug!("Ignoring press on unknown port {}", port);
                false
            }
        }
    }

    /// Finish the connection drag over `target`, or over empty space
    pub fn release_on_port(&mut self, target: Option<&PortId>) -> Option<ConnectionId> {
        let (model, registry, scene) = self.navigation.parts_mut();
        let live = match scene.take_grabber() {
            Some(LiveItem::Connection(live)) => live,
            Some(node @ LiveItem::Node(_)) => {
                scene.set_grabber(node);
                return None;
            }
            None => return None,
        };
        let target = target?;
        let result = registry.commit_live_connection(model, &live, target);
        self.report("Connect", result).flatten()
    }

    /// Discard the pending grabber; no-op without one
    pub fn cancel(&mut self) -> bool {
        self.navigation.scene_mut().cancel_grabber()
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Remove the selected nodes and connections
    pub fn delete_selected(&mut self) {
        let selection = self.model().selection().clone();
        if selection.is_empty() {
            return;
        }
        let nodes: Vec<NodeId> = selection.nodes.into_iter().collect();
        let connections: Vec<ConnectionId> = selection.connections.into_iter().collect();
        let result = self.navigation.model_mut().remove(&nodes, &connections);
        self.report("Delete", result);
    }

    /// Toggle bypass on every selected node as one undo step
    pub fn bypass_selected(&mut self) {
        let nodes: Vec<NodeId> = self.model().selection().nodes.iter().cloned().collect();
        if nodes.is_empty() {
            return;
        }
        if !self.model().policy().supports_bypass() {
            let result = self.navigation.model_mut().toggle_node_bypass(&nodes[0]);
            self.report("Bypass", result);
            return;
        }

        let guard = match TransactionGuard::begin(&self.document, "Bypass selection") {
            Ok(guard) => guard,
            Err(e) => {
                self.report::<()>("Bypass", Err(e.into()));
                return;
            }
        };
        for id in &nodes {
            let result = self.navigation.model_mut().toggle_node_bypass(id);
            if self.report("Bypass", result).is_none() {
                // Dropping the guard rolls the whole gesture back.
                return;
            }
        }
        if let Err(e) = guard.commit() {
            self.report::<()>("Bypass", Err(e.into()));
        }
    }

    /// Move the selected nodes into a new node graph (shading graphs only)
    pub fn group_selected(&mut self) -> Option<NodeId> {
        let nodes: Vec<NodeId> = self.model().selection().nodes.iter().cloned().collect();
        let result = self.navigation.model_mut().group_into_node_graph(&nodes);
        let group = self.report("Group", result)?;
        tracing::info!("Grouped {} nodes into {}", nodes.len(), group);
        Some(group)
    }

    /// Designate the terminal node; `None` clears it
    pub fn set_terminal_node(&mut self, id: Option<&NodeId>) -> bool {
        let result = self.navigation.model_mut().set_terminal_node(id);
        self.report("Set terminal", result).is_some()
    }

    /// Undo the last transaction
    pub fn undo(&mut self) -> bool {
        self.navigation.scene_mut().cancel_grabber();
        let result = self.document.borrow_mut().undo();
        match result {
            Ok(()) => true,
            Err(e) => {
                self.notify(NoticeSeverity::Info, format!("Undo: {e}"));
                false
            }
        }
    }

    /// Redo the last undone transaction
    pub fn redo(&mut self) -> bool {
        self.navigation.scene_mut().cancel_grabber();
        let result = self.document.borrow_mut().redo();
        match result {
            Ok(()) => true,
            Err(e) => {
                self.notify(NoticeSeverity::Info, format!("Redo: {e}"));
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Menus
    // ------------------------------------------------------------------

    /// Apply finished menu results
    pub fn poll_menus(&mut self) -> bool {
        self.menus.poll_menus()
    }

    /// Creation menu of the active mode, once built
    pub fn creation_menu(&self) -> Option<&CreationMenu> {
        self.menus.menu()
    }

    /// Block until the active creation menu is built or `timeout` elapses
    pub fn wait_for_menu(&mut self, timeout: Duration) -> Option<&CreationMenu> {
        self.menus.wait_for_menu(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_document;
    use nodeweave_document::{MemoryDocument, MemorySelection};
    use nodeweave_editor_graph::{GraphEvent, GraphKind, Selection};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Harness {
        document: Rc<RefCell<MemoryDocument>>,
        selection: Rc<RefCell<MemorySelection>>,
        editor: EditorController,
    }

    fn path(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    fn node(s: &str) -> NodeId {
        NodeId::new(path(s))
    }

    fn harness() -> Harness {
        let document = Rc::new(RefCell::new(demo_document().unwrap()));
        let selection = Rc::new(RefCell::new(MemorySelection::new()));
        let handle: DocumentHandle = document.clone();
        let selection_handle: SelectionHandle = selection.clone();
        let editor = EditorController::new(handle, selection_handle, EditorConfig::default());
        Harness {
            document,
            selection,
            editor,
        }
    }

    fn opened() -> Harness {
        let mut h = harness();
        assert!(h.editor.navigate_to(&path("/Graph1")));
        h.editor.process_pending();
        h
    }

    fn assert_scene_mirrors_model(editor: &EditorController) {
        assert_eq!(editor.scene().node_items().count(), editor.model().node_count());
        assert_eq!(editor.scene().connection_items().count(), editor.model().connections().count());
        for connection in editor.model().connections() {
            assert!(editor.model().port(&connection.start).is_some());
            assert!(editor.model().port(&connection.end).is_some());
        }
    }

    #[test]
    fn test_create_node_scenario() {
        let mut h = opened();
        let created = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&created);
        h.editor.navigation.model_mut().events_mut().observe(move |event| {
            if matches!(event, GraphEvent::NodeCreated(_)) {
                *counter.borrow_mut() += 1;
            }
        });
        let before = h.document.borrow().get_children(&path("/Graph1")).len();

        assert!(h.editor.create_node("Add"));
        let id = h.editor.commit_grabber([500.0, 0.0]).unwrap();
        h.editor.process_pending();

        assert_eq!(*created.borrow(), 1);
        assert_eq!(id, node("/Graph1/Add3"));
        let children = h.document.borrow().get_children(&path("/Graph1"));
        assert_eq!(children.len(), before + 1);
        assert_eq!(children.last().map(|child| child.type_name.as_str()), Some("Add"));
        assert!(h.editor.scene().node_item(&id).is_some());
        assert_scene_mirrors_model(&h.editor);
    }

    #[test]
    fn test_cancel_placement_writes_nothing() {
        let mut h = opened();
        let transactions = h.document.borrow().transaction_count();
        let nodes = h.editor.model().node_count();

        assert!(h.editor.create_node("Merge"));
        assert!(h.editor.create_typed_node("Backdrop"));
        assert!(h.editor.cancel());
        assert!(!h.editor.cancel());
        h.editor.process_pending();

        assert_eq!(h.document.borrow().transaction_count(), transactions);
        assert_eq!(h.editor.model().node_count(), nodes);
        assert!(h.editor.scene().grabber().is_none());
    }

    #[test]
    fn test_unsupported_type_becomes_notice() {
        let mut h = opened();
        assert!(!h.editor.create_node("PreviewSurface"));
        let notices = h.editor.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, NoticeSeverity::Warning);
        assert!(h.editor.notices().is_empty());
    }

    #[test]
    fn test_connection_gesture() {
        let mut h = opened();
        let out = PortId::new(node("/Graph1/Add2"), "outputs:out");
        let input = PortId::new(node("/Graph1/Add1"), "inputs:b");

        h.editor.scene_mut().press_port(out.clone());
        h.editor.process_pending();
        assert!(matches!(h.editor.scene().grabber(), Some(LiveItem::Connection(_))));

        h.editor.scene_mut().release_connection(Some(input.clone()));
        h.editor.process_pending();
        assert!(h.editor.scene().grabber().is_none());
        assert!(h.editor.model().has_connection(&ConnectionId::new(out.clone(), input)));
        assert_scene_mirrors_model(&h.editor);

        // Self-loop is discarded without a write or a notice
        let transactions = h.document.borrow().transaction_count();
        assert!(h.editor.press_port(&out));
        assert!(h
            .editor
            .release_on_port(Some(&PortId::new(node("/Graph1/Add2"), "inputs:b")))
            .is_none());
        assert_eq!(h.document.borrow().transaction_count(), transactions);
        assert!(h.editor.notices().is_empty());
    }

    #[test]
    fn test_delete_then_undo_restores() {
        let mut h = opened();
        let nodes = h.editor.model().node_count();
        let connections = h.editor.model().connections().count();

        h.editor
            .scene_mut()
            .select(Selection::from_nodes([node("/Graph1/Add1")]));
        h.editor.process_pending();
        assert_eq!(h.selection.borrow().selected_paths(), vec![path("/Graph1/Add1")]);

        h.editor.scene_mut().request_delete();
        h.editor.process_pending();
        assert_eq!(h.editor.model().node_count(), nodes - 1);
        assert_eq!(h.editor.model().connections().count(), connections - 2);
        assert_scene_mirrors_model(&h.editor);

        assert!(h.editor.undo());
        h.editor.process_pending();
        assert_eq!(h.editor.model().node_count(), nodes);
        assert_eq!(h.editor.model().connections().count(), connections);
        assert_scene_mirrors_model(&h.editor);
    }

    #[test]
    fn test_bypass_selected_is_one_undo_step() {
        let mut h = opened();
        let ids = [node("/Graph1/Add1"), node("/Graph1/Add2")];
        h.editor.navigation.model_mut().on_selection_set(Selection::from_nodes(ids.clone()));
        let transactions = h.document.borrow().transaction_count();

        h.editor.bypass_selected();
        h.editor.process_pending();
        assert_eq!(h.document.borrow().transaction_count(), transactions + 1);
        assert!(ids.iter().all(|id| h.editor.model().node(id).unwrap().bypassed));

        assert!(h.editor.undo());
        h.editor.process_pending();
        assert!(ids.iter().all(|id| !h.editor.model().node(id).unwrap().bypassed));
    }

    #[test]
    fn test_double_click_specializes_and_breadcrumb_restores() {
        let mut h = opened();
        let procedural = h.editor.model().token();

        h.editor.scene_mut().double_click_node(node("/Graph1/Material1"));
        h.editor.process_pending();
        assert_eq!(h.editor.state(), NavigationState::Specialized);
        assert_eq!(h.editor.root(), &path("/Graph1/Material1"));
        assert_eq!(h.editor.model().kind(), GraphKind::Shading);
        assert_scene_mirrors_model(&h.editor);

        let crumbs = h.editor.breadcrumbs();
        assert!(h.editor.navigate_to(&crumbs[0].path));
        h.editor.process_pending();
        assert_eq!(h.editor.state(), NavigationState::Active);
        assert_eq!(h.editor.model().token(), procedural);
        assert_scene_mirrors_model(&h.editor);
    }

    #[test]
    fn test_double_click_group_falls_through() {
        let mut h = opened();
        assert!(!h.editor.enter_node(&node("/Graph1/Add1")));
        h.editor.scene_mut().double_click_node(node("/Graph1/Group1"));
        h.editor.process_pending();
        assert_eq!(h.editor.state(), NavigationState::Active);
        assert_eq!(h.editor.root(), &path("/Graph1/Group1"));
        assert_eq!(h.editor.breadcrumbs().len(), 2);
    }

    #[test]
    fn test_shader_creation_in_specialized_mode() {
        let mut h = opened();
        assert!(h.editor.navigate_to(&path("/Graph1/Material1")));
        h.editor.process_pending();

        assert!(h.editor.create_shader_node("ConstantColor"));
        let id = h.editor.commit_grabber([0.0, 200.0]).unwrap();
        h.editor.process_pending();
        assert_eq!(id, node("/Graph1/Material1/ConstantColor1"));
        assert!(h.editor.scene().node_item(&id).is_some());

        assert!(!h.editor.create_node("Add"));
    }

    #[test]
    fn test_group_selected_shaders() {
        let mut h = opened();
        assert!(h.editor.navigate_to(&path("/Graph1/Material1")));
        h.editor.process_pending();
        let undo_depth = h.document.borrow().history().stats().undo_count;

        h.editor.scene_mut().select(Selection::from_nodes([
            node("/Graph1/Material1/Surface1"),
            node("/Graph1/Material1/Texture1"),
        ]));
        h.editor.process_pending();
        let group = h.editor.group_selected().unwrap();
        h.editor.process_pending();

        assert_eq!(group, node("/Graph1/Material1/NodeGraph1"));
        assert!(h.editor.model().node(&group).is_some());
        assert!(h.editor.model().node(&node("/Graph1/Material1/Surface1")).is_none());
        assert!(h.editor.model().node(&node("/Graph1/Material1/Coords1")).is_some());
        assert_eq!(h.document.borrow().history().stats().undo_count, undo_depth + 1);
        assert_scene_mirrors_model(&h.editor);

        // The grouped shaders are entered like any node graph
        h.editor.scene_mut().double_click_node(group.clone());
        h.editor.process_pending();
        assert_eq!(h.editor.state(), NavigationState::Specialized);
        assert_eq!(h.editor.root(), group.path());
        assert_eq!(h.editor.model().node_count(), 2);

        assert!(h.editor.undo());
        h.editor.process_pending();
        assert_eq!(h.editor.state(), NavigationState::Empty);
    }

    #[test]
    fn test_group_selected_outside_shading_is_a_notice() {
        let mut h = opened();
        h.editor
            .scene_mut()
            .select(Selection::from_nodes([node("/Graph1/Add1")]));
        h.editor.process_pending();
        assert!(h.editor.group_selected().is_none());
        let notices = h.editor.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, NoticeSeverity::Warning);
    }

    #[test]
    fn test_close_to_empty() {
        let mut h = opened();
        assert!(h.editor.navigate_to(&DocPath::empty()));
        h.editor.process_pending();
        assert_eq!(h.editor.state(), NavigationState::Empty);
        assert_eq!(h.editor.model().node_count(), 0);
        assert_eq!(h.editor.scene().item_count(), 0);
        assert!(!h.editor.create_node("Add"));
    }

    #[test]
    fn test_entry_screen_actions() {
        let mut h = harness();
        let created = h.editor.create_new_graph().unwrap();
        assert_eq!(created, path("/Graph2"));
        assert_eq!(h.editor.state(), NavigationState::Active);
        assert_eq!(h.editor.model().node_count(), 0);

        h.editor.navigate_to(&DocPath::empty());
        assert!(!h.editor.open_selected());

        h.selection
            .borrow_mut()
            .set_selected_paths(vec![path("/Graph1/Add1")]);
        assert!(h.editor.open_selected());
        assert_eq!(h.editor.root(), &path("/Graph1"));
    }

    #[test]
    fn test_open_selected_behaves_like_navigation() {
        let mut h = opened();
        assert!(h.editor.create_node("Add"));
        assert!(h.editor.scene().grabber().is_some());

        h.selection
            .borrow_mut()
            .set_selected_paths(vec![path("/Graph1/Material1/Surface1")]);
        assert!(h.editor.open_selected());
        h.editor.process_pending();

        assert!(h.editor.scene().grabber().is_none());
        assert_eq!(h.editor.state(), NavigationState::Specialized);
        assert_eq!(h.editor.root(), &path("/Graph1/Material1"));
        assert!(h.editor.notices().is_empty());
        let menu = h.editor.wait_for_menu(Duration::from_secs(5)).unwrap();
        assert_eq!(menu.kind, GraphKind::Shading);

        h.selection.borrow_mut().set_selected_paths(vec![path("/Missing/Add1")]);
        assert!(!h.editor.open_selected());
        let notices = h.editor.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, NoticeSeverity::Warning);
        assert_eq!(h.editor.root(), &path("/Graph1/Material1"));
    }

    #[test]
    fn test_read_only_document_reports_error() {
        let mut h = opened();
        h.document.borrow_mut().set_read_only(true);
        let positions: Vec<[f32; 2]> = h.editor.model().nodes().map(|n| n.position).collect();

        h.editor.scene_mut().move_nodes(vec![node("/Graph1/Add1")], [10.0, 10.0]);
        h.editor.process_pending();

        let notices = h.editor.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, NoticeSeverity::Error);
        let after: Vec<[f32; 2]> = h.editor.model().nodes().map(|n| n.position).collect();
        assert_eq!(after, positions);
    }

    #[test]
    fn test_external_removal_of_root_empties_editor() {
        let mut h = opened();
        h.document
            .borrow_mut()
            .edit("remove", |doc| doc.remove_node(&path("/Graph1")))
            .unwrap();
        h.editor.process_pending();
        assert_eq!(h.editor.state(), NavigationState::Empty);
        assert_eq!(h.editor.scene().item_count(), 0);
    }

    #[test]
    fn test_hint_text_and_menu() {
        let mut h = opened();
        h.editor
            .scene_mut()
            .set_hover(Some(HoverTarget::Node(node("/Graph1/Add1"))));
        assert_eq!(h.editor.hint_text().as_deref(), Some("Add1 Add node"));
        h.editor.scene_mut().set_hover(Some(HoverTarget::Port(PortId::new(
            node("/Graph1/Add1"),
            "inputs:a",
        ))));
        assert_eq!(h.editor.hint_text().as_deref(), Some("a (Input) port"));

        let menu = h.editor.wait_for_menu(Duration::from_secs(5)).unwrap();
        assert_eq!(menu.kind, GraphKind::Procedural);
        assert!(h.editor.create_from_menu("Multiply"));
        assert!(h.editor.place_pending().is_some());
    }

    #[test]
    fn test_terminal_and_rename() {
        let mut h = opened();
        assert!(h.editor.set_terminal_node(Some(&node("/Graph1/Add2"))));
        h.editor.process_pending();
        assert_eq!(h.editor.model().get_terminal_node(), Some(&node("/Graph1/Add2")));

        h.editor
            .scene_mut()
            .rename_node(node("/Graph1/Add2"), "Add1".to_string());
        h.editor.process_pending();
        assert_eq!(h.editor.take_notices().len(), 1);

        h.editor
            .scene_mut()
            .rename_node(node("/Graph1/Add2"), "Sum".to_string());
        h.editor.process_pending();
        assert!(h.editor.model().node(&node("/Graph1/Sum")).is_some());
        assert!(h.editor.scene().node_item(&node("/Graph1/Sum")).is_some());
        assert_scene_mirrors_model(&h.editor);
    }
}
