// SPDX-License-Identifier: MIT OR Apache-2.0
//! Creation menus, populated on a background worker.
//!
//! The worker only sees [`NodeTypeSource`]s and never touches the model or
//! the scene. Results come back over a channel and are applied on the owning
//! thread by [`MenuProvider::poll_menus`]; results for a graph kind that is
//! no longer active are dropped.

use indexmap::IndexMap;
use nodeweave_editor_graph::graphs::procedural::{create_procedural_registry, GROUP_TYPE, MATERIAL_TYPE};
use nodeweave_editor_graph::graphs::shading::{create_shading_registry, NODE_GRAPH_TYPE, SHADER_TYPE};
use nodeweave_editor_graph::graphs::BACKDROP_TYPE;
use nodeweave_editor_graph::{GraphKind, GraphPolicy, NodeRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Errors that can occur while building menus
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MenuError {
    /// A type list could not be read
    #[error("IO error: {0}")]
    Io(String),
    /// A type list is not valid RON
    #[error("Parse error: {0}")]
    Parse(String),
    /// A source failed
    #[error("Source '{source_name}' failed: {message}")]
    Source {
        /// Source name
        source_name: String,
        /// Failure description
        message: String,
    },
    /// The worker thread is gone
    #[error("Menu worker stopped")]
    WorkerStopped,
}

/// How a menu entry is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreationKind {
    /// Catalog node with ports
    Node,
    /// Plain document node of a supported type
    Typed,
    /// Shader node for a shader id
    Shader,
}

/// One creatable entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatableType {
    /// Type name or shader id
    pub id: String,
    /// Display name
    pub name: String,
    /// Menu group
    pub group: String,
    /// Placement kind
    pub kind: CreationKind,
    /// Graph kind the entry belongs to
    pub graph: GraphKind,
}

impl CreatableType {
    fn from_catalog(registry: &NodeRegistry, kind: CreationKind, graph: GraphKind) -> Vec<Self> {
        registry
            .types()
            .map(|node_type| Self {
                id: node_type.id.clone(),
                name: node_type.name.clone(),
                group: node_type.category.label().to_string(),
                kind,
                graph,
            })
            .collect()
    }

    /// Whether `policy` lets this entry be placed in its graph
    fn is_supported_by(&self, policy: &dyn GraphPolicy) -> bool {
        match self.kind {
            CreationKind::Shader => policy.supports_type(SHADER_TYPE) && policy.catalog().contains(&self.id),
            CreationKind::Node | CreationKind::Typed => policy.supports_type(&self.id),
        }
    }

    fn typed(id: &str, group: &str, graph: GraphKind) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            group: group.to_string(),
            kind: CreationKind::Typed,
            graph,
        }
    }
}

/// Supplies creatable node and shader identifiers
pub trait NodeTypeSource: Send {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Entries offered for `kind`
    fn creatable_types(&self, kind: GraphKind) -> Result<Vec<CreatableType>, MenuError>;
}

/// Built-in catalogs plus the container and annotation types of each kind
pub struct CatalogSource;

impl NodeTypeSource for CatalogSource {
    fn name(&self) -> &str {
        "catalog"
    }

    fn creatable_types(&self, kind: GraphKind) -> Result<Vec<CreatableType>, MenuError> {
        let mut types = match kind {
            GraphKind::Procedural => {
                CreatableType::from_catalog(&create_procedural_registry(), CreationKind::Node, kind)
            }
            GraphKind::Shading => {
                CreatableType::from_catalog(&create_shading_registry(), CreationKind::Shader, kind)
            }
        };
        match kind {
            GraphKind::Procedural => {
                types.push(CreatableType::typed(GROUP_TYPE, "Containers", kind));
                types.push(CreatableType::typed(MATERIAL_TYPE, "Containers", kind));
            }
            GraphKind::Shading => types.push(CreatableType::typed(NODE_GRAPH_TYPE, "Containers", kind)),
        }
        types.push(CreatableType::typed(BACKDROP_TYPE, "Annotation", kind));
        Ok(types)
    }
}

/// Menu for one graph kind, grouped for display
#[derive(Debug, Clone, PartialEq)]
pub struct CreationMenu {
    /// Graph kind
    pub kind: GraphKind,
    /// Entries by group, in first-seen order
    pub groups: IndexMap<String, Vec<CreatableType>>,
}

impl CreationMenu {
    fn build(kind: GraphKind, entries: impl IntoIterator<Item = CreatableType>) -> Self {
        let policy = kind.policy();
        let mut groups: IndexMap<String, Vec<CreatableType>> = IndexMap::new();
        for entry in entries {
            if entry.graph != kind {
                continue;
            }
            if !entry.is_supported_by(policy.as_ref()) {
                tracing::debug!("Skipping unsupported {} menu entry '{}'", kind.label(), entry.id);
                continue;
            }
            let group = groups.entry(entry.group.clone()).or_default();
            if !group.iter().any(|existing| existing.id == entry.id) {
                group.push(entry);
            }
        }
        Self { kind, groups }
    }

    /// Every entry, group by group
    pub fn entries(&self) -> impl Iterator<Item = &CreatableType> {
        self.groups.values().flatten()
    }

    /// Entry by id
    pub fn find(&self, id: &str) -> Option<&CreatableType> {
        self.entries().find(|entry| entry.id == id)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Whether the menu has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MenuRequest {
    kind: GraphKind,
}

struct MenuResponse {
    kind: GraphKind,
    result: Result<CreationMenu, MenuError>,
}

/// Owner-side handle of the menu worker
pub struct MenuProvider {
    request_tx: mpsc::UnboundedSender<MenuRequest>,
    result_rx: mpsc::UnboundedReceiver<MenuResponse>,
    active: Option<GraphKind>,
    menu: Option<CreationMenu>,
    last_error: Option<MenuError>,
}

impl MenuProvider {
    /// Start a worker over `sources`, optionally adding entries from a RON file
    pub fn new(sources: Vec<Box<dyn NodeTypeSource>>, extra_types_file: Option<PathBuf>) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            menu_worker(sources, extra_types_file, request_rx, result_tx);
        });

        Self {
            request_tx,
            result_rx,
            active: None,
            menu: None,
            last_error: None,
        }
    }

    /// Worker over the built-in catalogs only
    pub fn with_catalogs() -> Self {
        Self::new(vec![Box::new(CatalogSource)], None)
    }

    /// Ask for the menu of `kind`; a pending menu of another kind is discarded
    pub fn request(&mut self, kind: GraphKind) {
        if self.active == Some(kind) && self.menu.is_some() {
            return;
        }
        if self.active != Some(kind) {
            self.menu = None;
        }
        self.active = Some(kind);
        if self.request_tx.send(MenuRequest { kind }).is_err() {
            tracing::warn!("Menu worker stopped; {} menu unavailable", kind.label());
            self.last_error = Some(MenuError::WorkerStopped);
        }
    }

    /// Apply finished results; returns whether the active menu changed
    pub fn poll_menus(&mut self) -> bool {
        let mut updated = false;
        loop {
            match self.result_rx.try_recv() {
                Ok(response) => updated |= self.apply(response),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if self.last_error.is_none() {
                        tracing::warn!("Menu worker disconnected");
                        self.last_error = Some(MenuError::WorkerStopped);
                    }
                    break;
                }
            }
        }
        updated
    }

    fn apply(&mut self, response: MenuResponse) -> bool {
        if Some(response.kind) != self.active {
            tracing::debug!("Dropping stale {} menu", response.kind.label());
            return false;
        }
        match response.result {
            Ok(menu) => {
                tracing::debug!("{} menu ready ({} entries)", menu.kind.label(), menu.len());
                self.menu = Some(menu);
                self.last_error = None;
                true
            }
            Err(e) => {
                tracing::warn!("Failed to build {} menu: {e}", response.kind.label());
                self.last_error = Some(e);
                false
            }
        }
    }

    /// Poll until the active menu is available or `timeout` elapses
    pub fn wait_for_menu(&mut self, timeout: Duration) -> Option<&CreationMenu> {
        let deadline = Instant::now() + timeout;
        while self.menu.is_none() && self.active.is_some() && Instant::now() < deadline {
            self.poll_menus();
            if self.last_error == Some(MenuError::WorkerStopped) {
                break;
            }
            if self.menu.is_none() {
                std::thread::sleep(Duration::from_millis(2));
            }
        }
        self.menu.as_ref()
    }

    /// Menu for the active kind, once built
    pub fn menu(&self) -> Option<&CreationMenu> {
        self.menu.as_ref()
    }

    /// Error from the last build of the active menu
    pub fn last_error(&self) -> Option<&MenuError> {
        self.last_error.as_ref()
    }
}

/// Worker thread that builds menus on request
fn menu_worker(
    sources: Vec<Box<dyn NodeTypeSource>>,
    extra_types_file: Option<PathBuf>,
    mut request_rx: mpsc::UnboundedReceiver<MenuRequest>,
    result_tx: mpsc::UnboundedSender<MenuResponse>,
) {
    // Use tokio runtime for async file operations
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start menu worker runtime: {e}");
            return;
        }
    };

    rt.block_on(async {
        while let Some(request) = request_rx.recv().await {
            let result = build_menu(&sources, extra_types_file.as_deref(), request.kind).await;
            let response = MenuResponse {
                kind: request.kind,
                result,
            };
            if result_tx.send(response).is_err() {
                break; // Owner dropped
            }
        }
    });
}

async fn build_menu(
    sources: &[Box<dyn NodeTypeSource>],
    extra_types_file: Option<&Path>,
    kind: GraphKind,
) -> Result<CreationMenu, MenuError> {
    let mut entries = Vec::new();
    for source in sources {
        entries.extend(source.creatable_types(kind)?);
    }
    if let Some(path) = extra_types_file {
        entries.extend(load_type_list(path).await?);
    }
    Ok(CreationMenu::build(kind, entries))
}

/// Read a RON list of creatable types
async fn load_type_list(path: &Path) -> Result<Vec<CreatableType>, MenuError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MenuError::Io(format!("{}: {e}", path.display())))?;
    ron::from_str(&content).map_err(|e| MenuError::Parse(e.to_string()))
}
