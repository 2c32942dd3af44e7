// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed event buses for the model and the scene.
//!
//! ## Delivery contract
//!
//! - Observers registered with [`EventBus::observe`] are called
//!   synchronously, in registration order, while the event is emitted. They
//!   receive a shared reference and must not call back into the emitter.
//! - Every emitted event is also queued. The owner of the component drains
//!   the queue ([`EventBus::drain`]) from its event pump and routes events to
//!   the next component. All state changes caused by events happen here.

use crate::connection::ConnectionId;
use crate::node::NodeId;
use crate::port::PortId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Handle returned by [`EventBus::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Queue plus synchronous observer list for one event type
pub struct EventBus<E> {
    pending: VecDeque<E>,
    observers: Vec<(ObserverId, Box<dyn FnMut(&E)>)>,
    next_observer: u64,
}

impl<E> EventBus<E> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Notify observers, then queue the event
    pub fn emit(&mut self, event: E) {
        for (_, observer) in &mut self.observers {
            observer(&event);
        }
        self.pending.push_back(event);
    }

    /// Register a synchronous observer
    pub fn observe(&mut self, observer: impl FnMut(&E) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer; returns whether it was registered
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Take every queued event in emission order
    pub fn drain(&mut self) -> Vec<E> {
        self.pending.drain(..).collect()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop queued events without delivering them
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Selected nodes and connections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Selected nodes
    pub nodes: IndexSet<NodeId>,
    /// Selected connections
    pub connections: IndexSet<ConnectionId>,
}

impl Selection {
    /// Selection holding only `nodes`
    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
            connections: IndexSet::new(),
        }
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connections.is_empty()
    }

    /// Whether a node is selected
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Whether a connection is selected
    pub fn contains_connection(&self, id: &ConnectionId) -> bool {
        self.connections.contains(id)
    }
}

/// Changes announced by the graph model
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// Everything was rebuilt; consumers must re-read the model
    ModelReset,
    /// A node appeared
    NodeCreated(NodeId),
    /// A node disappeared
    NodeRemoved(NodeId),
    /// Position, bypass or other descriptor fields of a node changed
    NodeUpdated(NodeId),
    /// A connection appeared
    ConnectionCreated(ConnectionId),
    /// A connection disappeared
    ConnectionRemoved(ConnectionId),
    /// The selection changed
    SelectionChanged(Selection),
    /// A port appeared on or disappeared from an existing node
    PortUpdated(PortId),
    /// The terminal node changed
    TerminalNodeChanged(Option<NodeId>),
}

/// Gestures forwarded by the scene
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// A port was pressed, starting a connection drag
    PortPressed(PortId),
    /// A connection drag ended, over a port or over empty space
    ConnectionDropped(Option<PortId>),
    /// A node was double-clicked
    NodeDoubleClicked(NodeId),
    /// Nodes were dragged by `delta`
    NodesMoved {
        /// Moved nodes
        ids: Vec<NodeId>,
        /// Offset in graph space
        delta: [f32; 2],
    },
    /// A node was renamed in place
    NodeRenamed {
        /// Renamed node
        id: NodeId,
        /// Requested name
        name: String,
    },
    /// The user changed the selection
    SelectionChanged(Selection),
    /// The pending placement was dropped at a position
    PlacementRequested([f32; 2]),
    /// Delete the selection
    DeleteRequested,
    /// Cancel the current gesture
    CancelRequested,
}
