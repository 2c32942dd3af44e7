// SPDX-License-Identifier: MIT OR Apache-2.0
//! Navigation state machine: current root, mode and binding swaps.
//!
//! ## States
//!
//! - `Empty`: no root, the entry screen is shown
//! - `Active`: a procedural graph is open
//! - `Specialized`: a shading graph is open; the procedural binding is
//!   suspended and comes back unchanged when navigation leaves the mode
//!
//! Every transition goes through [`NavigationController::set_root`] and is
//! all-or-nothing: a failed transition leaves state, bindings and scene as
//! they were.

use nodeweave_document::{DocPath, DocumentHandle, SelectionHandle};
use nodeweave_editor_graph::{GraphKind, GraphModel, GraphPolicy, GraphScene, ItemRegistry, NodeId};
use serde::Serialize;

/// Navigation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NavigationState {
    /// No graph open
    Empty,
    /// Editing a procedural graph
    Active,
    /// Editing a specialized (shading) graph
    Specialized,
}

/// Model and item registry of one mode
pub struct ModeBinding {
    /// Graph model
    pub model: GraphModel,
    /// Item factory
    pub registry: ItemRegistry,
}

impl ModeBinding {
    /// Create an unrooted binding for `kind`
    pub fn new(document: DocumentHandle, selection: SelectionHandle, kind: GraphKind) -> Self {
        Self {
            model: GraphModel::with_kind(document, selection, kind),
            registry: ItemRegistry::with_kind(kind),
        }
    }

    /// Graph kind of the binding
    pub fn kind(&self) -> GraphKind {
        self.model.kind()
    }
}

/// One breadcrumb entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    /// Display name
    pub name: String,
    /// Root to navigate to
    pub path: DocPath,
}

/// Tracks the current root and swaps bindings between modes
pub struct NavigationController {
    document: DocumentHandle,
    selection: SelectionHandle,
    specialization_types: Vec<String>,
    state: NavigationState,
    active: ModeBinding,
    suspended: Option<ModeBinding>,
    scene: GraphScene,
}

impl NavigationController {
    /// Create a controller in the `Empty` state
    pub fn new(document: DocumentHandle, selection: SelectionHandle, specialization_types: Vec<String>) -> Self {
        let active = ModeBinding::new(document.clone(), selection.clone(), GraphKind::Procedural);
        let mut scene = GraphScene::new();
        scene.initialize(&active.model, &active.registry);
        Self {
            document,
            selection,
            specialization_types,
            state: NavigationState::Empty,
            active,
            suspended: None,
            scene,
        }
    }

    /// Current state
    pub fn state(&self) -> NavigationState {
        self.state
    }

    /// Current root; empty in the `Empty` state
    pub fn root(&self) -> &DocPath {
        self.active.model.get_root()
    }

    /// Kind of the active binding
    pub fn kind(&self) -> GraphKind {
        self.active.kind()
    }

    /// Active model
    pub fn model(&self) -> &GraphModel {
        &self.active.model
    }

    /// Active model, mutably
    pub fn model_mut(&mut self) -> &mut GraphModel {
        &mut self.active.model
    }

    /// Active item registry
    pub fn registry(&self) -> &ItemRegistry {
        &self.active.registry
    }

    /// The scene
    pub fn scene(&self) -> &GraphScene {
        &self.scene
    }

    /// The scene, mutably
    pub fn scene_mut(&mut self) -> &mut GraphScene {
        &mut self.scene
    }

    /// Split borrow of the active binding and the scene
    pub fn parts_mut(&mut self) -> (&mut GraphModel, &ItemRegistry, &mut GraphScene) {
        (&mut self.active.model, &self.active.registry, &mut self.scene)
    }

    /// Suspended procedural binding, while specialized
    pub fn suspended(&self) -> Option<&ModeBinding> {
        self.suspended.as_ref()
    }

    /// Specialization predicate: whether `path` names a node of a
    /// specialization type
    pub fn is_specialization(&self, path: &DocPath) -> bool {
        let node = self.document.borrow().get_node(path);
        node.is_some_and(|node| self.specialization_types.iter().any(|t| *t == node.type_name))
    }

    /// Whether `path` names a node that can be the root of the graph it
    /// would open in
    pub fn can_open(&self, path: &DocPath) -> bool {
        if path.is_empty() || path.is_root() {
            return false;
        }
        let Some(node) = self.document.borrow().get_node(path) else {
            return false;
        };
        let kind = if self.opens_specialized(path) {
            GraphKind::Shading
        } else {
            GraphKind::Procedural
        };
        kind.policy().can_be_root(&node)
    }

    /// Whether `path` opens in the shading graph: a specialization itself, or
    /// a shading root nested inside one
    pub fn opens_specialized(&self, path: &DocPath) -> bool {
        if self.is_specialization(path) {
            return true;
        }
        let Some(node) = self.document.borrow().get_node(path) else {
            return false;
        };
        GraphKind::Shading.policy().can_be_root(&node)
            && path
                .ancestors()
                .iter()
                .filter(|ancestor| *ancestor != path)
                .any(|ancestor| self.is_specialization(ancestor))
    }

    /// Whether double-clicking `id` navigates into it
    pub fn can_enter(&self, id: &NodeId) -> bool {
        if id.path() == self.root() {
            return false;
        }
        self.active.model.can_fall_through(id)
            || (self.active.model.node(id).is_some() && self.is_specialization(id.path()))
    }

    /// Navigate to `path`, swapping modes when the specialization predicate
    /// changes. The empty path closes the graph.
    pub fn set_root(&mut self, path: &DocPath) -> nodeweave_editor_graph::Result<()> {
        if path.is_empty() {
            self.close();
            return Ok(());
        }

        let specialize = self.opens_specialized(path);
        match (self.state, specialize) {
            (NavigationState::Specialized, true) | (NavigationState::Empty | NavigationState::Active, false) => {
                self.active.model.set_root(path)?;
            }
            (NavigationState::Empty | NavigationState::Active, true) => self.enter_specialized(path)?,
            (NavigationState::Specialized, false) => self.leave_specialized(path)?,
        }

        self.state = if specialize {
            NavigationState::Specialized
        } else {
            NavigationState::Active
        };
        Ok(())
    }

    fn enter_specialized(&mut self, path: &DocPath) -> nodeweave_editor_graph::Result<()> {
        let mut binding = ModeBinding::new(self.document.clone(), self.selection.clone(), GraphKind::Shading);
        binding.model.set_root(path)?;

        let previous = std::mem::replace(&mut self.active, binding);
        self.suspended = Some(previous);
        self.rebind_scene();
        tracing::info!("Entered {} mode at {}", self.active.kind().label(), path);
        Ok(())
    }

    fn leave_specialized(&mut self, path: &DocPath) -> nodeweave_editor_graph::Result<()> {
        let Some(mut previous) = self.suspended.take() else {
            return self.active.model.set_root(path);
        };
        if let Err(e) = previous.model.set_root(path) {
            self.suspended = Some(previous);
            return Err(e);
        }

        let specialized = std::mem::replace(&mut self.active, previous);
        drop(specialized);
        self.rebind_scene();
        tracing::info!("Returned to {} mode at {}", self.active.kind().label(), path);
        Ok(())
    }

    /// Close the graph and restore the procedural binding
    fn close(&mut self) {
        if let Some(previous) = self.suspended.take() {
            self.active = previous;
            tracing::info!("Left specialized mode");
        }
        // An empty root is always accepted.
        let _ = self.active.model.set_root(&DocPath::empty());
        self.rebind_scene();
        self.state = NavigationState::Empty;
    }

    /// Bind the scene to the active binding and rebuild it. Events queued on
    /// the model before the swap describe the old state and are discarded.
    fn rebind_scene(&mut self) {
        self.active.model.events_mut().clear();
        self.scene.initialize(&self.active.model, &self.active.registry);
    }

    /// Reconcile the active model with the document. A root that vanished
    /// from the document moves navigation to `Empty`.
    pub fn sync(&mut self) -> bool {
        let changed = self.active.model.sync();
        if self.state != NavigationState::Empty && self.root().is_empty() {
            tracing::info!("Graph root no longer exists; closing");
            self.close();
        }
        changed
    }

    /// Deliver queued model events to the scene; returns how many were applied
    pub fn deliver_model_events(&mut self) -> usize {
        let events = self.active.model.drain_events();
        let token = self.active.model.token();
        events
            .iter()
            .filter(|event| {
                self.scene
                    .handle_model_event(token, event, &self.active.model, &self.active.registry)
            })
            .count()
    }

    /// Path from the top-level container down to the current root
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.root()
            .ancestors()
            .into_iter()
            .map(|path| Breadcrumb {
                name: path.name().to_string(),
                path,
            })
            .collect()
    }
}
