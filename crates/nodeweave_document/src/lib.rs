// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hierarchical document access for `NodeWeave`.
//!
//! The graph editor never talks to the document store directly. It goes
//! through the [`DocumentAdapter`] facade, which provides:
//! - Node, child and property reads
//! - Prefix-scoped change subscriptions with deferred delivery
//! - Reentrant transactions with rollback and undo/redo
//!
//! [`MemoryDocument`] is the in-memory implementation used by the editor
//! binary and by tests. [`SelectionService`] is the application-wide
//! selection shared between editor windows.

pub mod adapter;
pub mod change;
pub mod history;
pub mod memory;
pub mod node;
pub mod path;
pub mod selection;

pub use adapter::{DocumentAdapter, DocumentError, DocumentHandle, TransactionGuard};
pub use change::{Broadcaster, DocumentChange, Subscription};
pub use history::{History, HistoryError, StateSnapshot};
pub use memory::MemoryDocument;
pub use node::{DocumentNode, NodeMetadata, Property, PropertyValue};
pub use path::{is_valid_name, DocPath, PathError, PropertyPath};
pub use selection::{MemorySelection, SelectionHandle, SelectionService};
