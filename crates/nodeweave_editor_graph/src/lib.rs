// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph synchronization engine for `NodeWeave`.
//!
//! This crate keeps a visual node graph in step with a hierarchical scene
//! document. It provides:
//! - Graph kinds with their node catalogs and rules (procedural, shading)
//! - A cached graph model over one root node of the document
//! - An item registry building visual items and uncommitted "live" items
//! - A scene mirroring the model, plus an egui view drawing it
//!
//! ## Architecture
//!
//! Data flows one way. The document notifies, the [`GraphModel`] reconciles
//! its cache on [`GraphModel::sync`] and emits [`GraphEvent`]s, and the
//! [`GraphScene`] rebuilds items from those events. User gestures travel the
//! other way as [`SceneEvent`]s and become model operations, each one a
//! single undoable document transaction.

pub mod connection;
pub mod error;
pub mod event;
pub mod graphs;
pub mod model;
pub mod node;
pub mod port;
pub mod registry;
pub mod scene;
pub mod ui;

#[cfg(test)]
mod fixtures;

pub use connection::ConnectionId;
pub use error::{GraphError, Result, ValidationError};
pub use event::{EventBus, GraphEvent, SceneEvent, Selection};
pub use graphs::{GraphKind, GraphPolicy};
pub use model::{GraphModel, ModelToken};
pub use node::{NodeDescriptor, NodeId, NodeRegistry, NodeType};
pub use port::{PortDirection, PortId, PortType};
pub use registry::{ItemRegistry, LiveItem, NodeItem, PlacementRequest};
pub use scene::{GraphScene, HoverTarget};
pub use ui::{GraphView, ViewState};
