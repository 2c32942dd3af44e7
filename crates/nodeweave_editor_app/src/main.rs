// SPDX-License-Identifier: MIT OR Apache-2.0
//! `NodeWeave` - node-graph editor front end
//!
//! Opens a document (or the built-in demo), navigates to a graph root and
//! prints the synchronized graph state as text or JSON.
//!
//! ## Architecture
//!
//! The editor crates keep a document and a graph scene in sync:
//! - `nodeweave_document`: hierarchical document with transactions and undo
//! - `nodeweave_editor_graph`: graph model, item registry and scene
//! - this crate: navigation, creation menus and the editor controller
//!
//! ## Usage
//!
//! ```text
//! nodeweave [--config editor.ron] [--json] [document.ron] [root]
//! ```

mod config;
mod controller;
mod demo;
mod menus;
mod navigation;

use config::EditorConfig;
use controller::EditorController;
use navigation::{Breadcrumb, NavigationState};
use nodeweave_document::{DocPath, DocumentHandle, MemoryDocument, MemorySelection, SelectionHandle};
use nodeweave_editor_graph::model::connection_description;
use nodeweave_editor_graph::node::NodeDescriptor;
use nodeweave_editor_graph::port::PortDescriptor;
use nodeweave_editor_graph::{ConnectionId, GraphKind};
use serde::Serialize;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Fallback root when neither the command line nor the config names one
const DEFAULT_ROOT: &str = "/Graph1";

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("Document error: {0}")]
    Document(#[from] nodeweave_document::DocumentError),

    #[error("Invalid path: {0}")]
    Path(#[from] nodeweave_document::PathError),

    #[error("Cannot open {0}")]
    Open(DocPath),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    json: bool,
    document: Option<PathBuf>,
    root: Option<String>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, CliError> {
        let mut parsed = Self::default();
        let mut positional = Vec::new();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--json" => parsed.json = true,
                "--config" => {
                    let file = args
                        .next()
                        .ok_or_else(|| CliError::Usage("--config needs a file".to_string()))?;
                    parsed.config = Some(PathBuf::from(file));
                }
                flag if flag.starts_with("--") => {
                    return Err(CliError::Usage(format!("Unknown option {flag}")));
                }
                _ => positional.push(arg),
            }
        }
        let mut positional = positional.into_iter();
        parsed.document = positional.next().map(PathBuf::from);
        parsed.root = positional.next();
        if let Some(extra) = positional.next() {
            return Err(CliError::Usage(format!("Unexpected argument {extra}")));
        }
        Ok(parsed)
    }
}

/// Snapshot of the open graph, as printed by the front end
#[derive(Debug, Serialize)]
struct GraphReport {
    state: NavigationState,
    root: DocPath,
    kind: Option<GraphKind>,
    breadcrumbs: Vec<Breadcrumb>,
    terminal: Option<DocPath>,
    nodes: Vec<NodeDescriptor>,
    ports: Vec<PortDescriptor>,
    connections: Vec<ConnectionId>,
    menu: Vec<String>,
}

impl GraphReport {
    fn capture(editor: &EditorController) -> Self {
        let model = editor.model();
        let open = editor.state() != NavigationState::Empty;
        Self {
            state: editor.state(),
            root: editor.root().clone(),
            kind: open.then(|| model.kind()),
            breadcrumbs: editor.breadcrumbs(),
            terminal: model.get_terminal_node().map(|id| id.path().clone()),
            nodes: model.nodes().cloned().collect(),
            ports: model.ports().cloned().collect(),
            connections: model.connections().cloned().collect(),
            menu: editor
                .creation_menu()
                .map(|menu| menu.entries().map(|entry| entry.id.clone()).collect())
                .unwrap_or_default(),
        }
    }

    fn print_text(&self) {
        let crumbs: Vec<&str> = self.breadcrumbs.iter().map(|crumb| crumb.name.as_str()).collect();
        println!("{:?}: {}", self.state, crumbs.join(" > "));
        if let Some(kind) = self.kind {
            println!("Mode: {}", kind.label());
        }
        if let Some(terminal) = &self.terminal {
            println!("Terminal: {terminal}");
        }
        println!("Nodes ({}):", self.nodes.len());
        for node in &self.nodes {
            let ports = self.ports.iter().filter(|port| port.id.node == node.id).count();
            let bypass = if node.bypassed { " [bypassed]" } else { "" };
            println!(
                "  {} ({}) at [{}, {}], {} ports{}",
                node.name, node.type_name, node.position[0], node.position[1], ports, bypass
            );
        }
        println!("Connections ({}):", self.connections.len());
        for connection in &self.connections {
            println!("  {}", connection_description(connection));
        }
        if !self.menu.is_empty() {
            println!("Creatable: {}", self.menu.join(", "));
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };

    let document = match &args.document {
        Some(path) => {
            tracing::info!("Loading {}", path.display());
            MemoryDocument::load(path)?
        }
        None => {
            tracing::info!("No document given, using the demo graph");
            demo::demo_document_with_depth(config.history.undo_depth)?
        }
    };
    let document: DocumentHandle = Rc::new(RefCell::new(document));
    let selection: SelectionHandle = Rc::new(RefCell::new(MemorySelection::new()));

    let root = args
        .root
        .clone()
        .or_else(|| config.editor.default_root.clone())
        .unwrap_or_else(|| DEFAULT_ROOT.to_string());
    let root = DocPath::parse(&root)?;

    let mut editor = EditorController::new(document, selection, config);
    if !editor.navigate_to(&root) {
        for notice in editor.take_notices() {
            tracing::error!("{}", notice.message);
        }
        return Err(CliError::Open(root));
    }
    editor.process_pending();
    editor.wait_for_menu(std::time::Duration::from_secs(2));

    let report = GraphReport::capture(&editor);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_text();
    }
    Ok(())
}

fn main() {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    match "nodeweave_editor_app=debug".parse::<tracing_subscriber::filter::Directive>() {
        Ok(directive) => env_filter = env_filter.add_directive(directive),
        Err(e) => eprintln!("Invalid log directive: {e}"),
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting NodeWeave v{}", env!("CARGO_PKG_VERSION"));

    let result = Args::parse(std::env::args().skip(1)).and_then(run);
    if let Err(e) = result {
        tracing::error!("{e}");
        eprintln!("nodeweave: {e}");
        std::process::exit(1);
    }
}
