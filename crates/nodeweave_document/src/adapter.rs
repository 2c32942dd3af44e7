// SPDX-License-Identifier: MIT OR Apache-2.0
//! The document adapter: the facade the editor uses to read, observe and
//! write the hierarchical document.
//!
//! ## Transactions
//!
//! Writes are only accepted inside a transaction. Transactions are reentrant:
//! a `begin_transaction` issued while one is open joins it, and only the
//! outermost `commit` publishes changes and records an undo step. A rollback
//! at any depth aborts the whole transaction; the outer commit then restores
//! the pre-transaction state and reports [`DocumentError::Aborted`].

use crate::change::{DocumentChange, Subscription};
use crate::history::HistoryError;
use crate::node::{DocumentNode, NodeMetadata, Property};
use crate::path::{DocPath, PathError, PropertyPath};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Document errors
#[derive(Debug, Error)]
pub enum DocumentError {
    /// A write was issued outside a transaction
    #[error("No transaction is open")]
    NoTransaction,

    /// Undo or redo was requested while a transaction is open
    #[error("A transaction is already open")]
    TransactionActive,

    /// The transaction was rolled back by a nested scope
    #[error("Transaction '{0}' was aborted")]
    Aborted(String),

    /// The target of a write is read-only
    #[error("Target is read-only: {0}")]
    ReadOnly(DocPath),

    /// No node exists at the path
    #[error("Node not found: {0}")]
    NodeNotFound(DocPath),

    /// A node already exists at the path
    #[error("Node already exists: {0}")]
    NodeExists(DocPath),

    /// No property exists at the path
    #[error("Property not found: {0}")]
    PropertyNotFound(PropertyPath),

    /// A property with the name already exists
    #[error("Property already exists: {0}")]
    PropertyExists(PropertyPath),

    /// Invalid path or name
    #[error(transparent)]
    Path(#[from] PathError),

    /// Undo/redo failure
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Snapshot encoding failure
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    /// Document file could not be parsed or written
    #[error("Format error: {0}")]
    Format(String),

    /// IO failure while loading or saving
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Facade over the hierarchical document store
pub trait DocumentAdapter {
    /// Snapshot of the node at `path`
    fn get_node(&self, path: &DocPath) -> Option<DocumentNode>;

    /// Snapshots of the direct children of `path`, in authoring order
    fn get_children(&self, path: &DocPath) -> Vec<DocumentNode>;

    /// Properties of the node at `path`
    fn get_properties(&self, path: &DocPath) -> Vec<Property>;

    /// Observe changes under `prefix` (and to its ancestors)
    fn subscribe(&mut self, prefix: &DocPath) -> Subscription<DocumentChange>;

    /// Open a transaction or join the open one
    fn begin_transaction(&mut self, label: &str) -> Result<()>;

    /// Close the current scope; the outermost commit publishes changes
    fn commit(&mut self) -> Result<()>;

    /// Abort the current transaction
    fn rollback(&mut self);

    /// Whether a transaction is open
    fn in_transaction(&self) -> bool;

    /// Number of committed outermost transactions
    fn transaction_count(&self) -> u64;

    /// Designate (or clear) the terminal node of `root`
    fn set_terminal(&mut self, root: &DocPath, node: Option<&DocPath>) -> Result<()>;

    /// Terminal node of `root`
    fn get_terminal(&self, root: &DocPath) -> Option<DocPath>;

    /// Create a node of `type_name` at `path`
    fn create_node(&mut self, path: &DocPath, type_name: &str) -> Result<()>;

    /// Remove the node at `path` with its subtree
    fn remove_node(&mut self, path: &DocPath) -> Result<()>;

    /// Rename a node; returns the new path
    fn rename_node(&mut self, path: &DocPath, new_name: &str) -> Result<DocPath>;

    /// Replace the layout metadata of a node
    fn set_metadata(&mut self, path: &DocPath, metadata: NodeMetadata) -> Result<()>;

    /// Author a new property on a node
    fn create_property(&mut self, path: &DocPath, property: Property) -> Result<()>;

    /// Connect `source` into `target`
    fn add_connection(&mut self, target: &PropertyPath, source: &PropertyPath) -> Result<()>;

    /// Disconnect `source` from `target`
    fn remove_connection(&mut self, target: &PropertyPath, source: &PropertyPath) -> Result<()>;

    /// Revert the last committed transaction
    fn undo(&mut self) -> Result<()>;

    /// Re-apply the last undone transaction
    fn redo(&mut self) -> Result<()>;

    /// Whether undo is available
    fn can_undo(&self) -> bool;

    /// Whether redo is available
    fn can_redo(&self) -> bool;
}

/// Shared, single-threaded handle to a document
pub type DocumentHandle = Rc<RefCell<dyn DocumentAdapter>>;

/// RAII transaction scope.
///
/// Rolls back on drop unless [`TransactionGuard::commit`] was called, so
/// every exit path closes the scope, including early returns and unwinding.
pub struct TransactionGuard {
    document: DocumentHandle,
    finished: bool,
}

impl TransactionGuard {
    /// Open (or join) a transaction on `document`
    pub fn begin(document: &DocumentHandle, label: &str) -> Result<Self> {
        document.borrow_mut().begin_transaction(label)?;
        Ok(Self {
            document: Rc::clone(document),
            finished: false,
        })
    }

    /// Close the scope
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        let mut document = self.document.borrow_mut();
        document.commit()
    }

    /// Abort explicitly
    pub fn rollback(mut self) {
        self.finished = true;
        self.document.borrow_mut().rollback();
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.document.try_borrow_mut() {
            Ok(mut document) => document.rollback(),
            Err(_) => tracing::error!("Document busy while rolling back an unfinished transaction"),
        }
    }
}
