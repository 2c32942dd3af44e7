// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types of the graph engine.

use crate::node::NodeId;
use crate::port::PortId;
use nodeweave_document::{DocPath, DocumentError};
use thiserror::Error;

/// Rejected requests. No document write is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The path does not name a container this graph kind can edit
    #[error("Not a valid graph root: {0:?}")]
    InvalidRoot(DocPath),

    /// The node type is unknown to the active catalog or policy
    #[error("Unsupported node type: {0}")]
    UnsupportedNodeType(String),

    /// A sibling with the requested name exists
    #[error("A node named '{0}' already exists")]
    NameCollision(String),

    /// The requested name is not a valid identifier
    #[error("Invalid node name: '{0}'")]
    InvalidName(String),

    /// Ports cannot be connected in this direction or with these types
    #[error("Cannot connect {start} to {end}")]
    IncompatibleConnection {
        /// Port the drag started from
        start: PortId,
        /// Port the drag ended on
        end: PortId,
    },

    /// Both ports belong to the same node
    #[error("Cannot connect {0} to itself")]
    SelfLoop(NodeId),

    /// The connection already exists
    #[error("Connection already exists: {start} -> {end}")]
    DuplicateConnection {
        /// Output port
        start: PortId,
        /// Input port
        end: PortId,
    },

    /// The active graph kind does not support the operation
    #[error("Operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    /// The node is not a descendant of the current root
    #[error("{0} is outside the current graph")]
    TerminalOutsideRoot(NodeId),

    /// No node of the current graph was given to group
    #[error("Nothing to group")]
    NothingToGroup,
}

/// Errors returned by graph model operations
#[derive(Debug, Error)]
pub enum GraphError {
    /// Request rejected before touching the document
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The document rejected a write; the transaction was rolled back
    #[error("Transaction failed: {0}")]
    Transaction(#[from] DocumentError),

    /// A cached id no longer matches the document
    #[error("Stale reference: {0}")]
    Consistency(String),
}

impl GraphError {
    /// Stale-reference errors are recovered by treating the target as gone
    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
