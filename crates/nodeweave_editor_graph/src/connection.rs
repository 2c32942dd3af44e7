// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::PortId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A connection between two ports.
///
/// The id is the connection itself: `start` is always the output side and
/// `end` the input side that stores the connection in the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId {
    /// Source (output) port
    pub start: PortId,
    /// Target (input) port
    pub end: PortId,
}

impl ConnectionId {
    /// Create a connection id
    pub fn new(start: PortId, end: PortId) -> Self {
        Self { start, end }
    }

    /// Source node
    pub fn start_node(&self) -> &NodeId {
        &self.start.node
    }

    /// Target node
    pub fn end_node(&self) -> &NodeId {
        &self.end.node
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.start.node == *node_id || self.end.node == *node_id
    }

    /// Check if this connection involves a specific port
    pub fn involves_port(&self, port_id: &PortId) -> bool {
        self.start == *port_id || self.end == *port_id
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.start, self.end)
    }
}
