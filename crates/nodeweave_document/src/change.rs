// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications and subscriptions.
//!
//! Notifications are deferred: a publisher pushes into per-subscriber queues
//! and the subscriber drains its queue when it is ready. Dropping a
//! [`Subscription`] unsubscribes it; the publisher only keeps a weak handle
//! and prunes dead subscribers on the next publish.

use crate::path::{DocPath, PropertyPath};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// A change to the document, published when a transaction commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocumentChange {
    /// A node was created
    NodeAdded(DocPath),
    /// A node and its subtree were removed
    NodeRemoved(DocPath),
    /// A node and its subtree moved to a new path
    NodeRenamed {
        /// Path before the rename
        old: DocPath,
        /// Path after the rename
        new: DocPath,
    },
    /// A property was created or its connections changed
    PropertyChanged(PropertyPath),
    /// Layout metadata of a node changed
    MetadataChanged(DocPath),
    /// The terminal node of a container changed
    TerminalChanged {
        /// Container whose terminal changed
        root: DocPath,
    },
    /// The whole document was replaced (undo, redo, reload)
    Reloaded,
}

impl DocumentChange {
    /// Whether a subscriber watching `prefix` must see this change.
    ///
    /// Changes to an ancestor of the prefix are included, since removing or
    /// renaming an ancestor invalidates everything beneath it.
    pub fn affects(&self, prefix: &DocPath) -> bool {
        let related = |path: &DocPath| path.has_prefix(prefix) || prefix.has_prefix(path);
        match self {
            Self::NodeAdded(path) | Self::MetadataChanged(path) => path.has_prefix(prefix),
            Self::NodeRemoved(path) => related(path),
            Self::NodeRenamed { old, new } => related(old) || related(new),
            Self::PropertyChanged(property) => property.node.has_prefix(prefix),
            Self::TerminalChanged { root } => related(root),
            Self::Reloaded => true,
        }
    }
}

type Queue<T> = Arc<Mutex<VecDeque<T>>>;

/// Receiving end of a notification stream
#[derive(Debug)]
pub struct Subscription<T> {
    queue: Queue<T>,
}

impl<T> Subscription<T> {
    /// Take every queued notification in publish order
    pub fn drain(&self) -> Vec<T> {
        self.queue.lock().drain(..).collect()
    }

    /// Number of queued notifications
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

struct Subscriber<T> {
    filter: Option<DocPath>,
    queue: Weak<Mutex<VecDeque<T>>>,
}

/// Publishing end: fans notifications out to live subscribers
pub struct Broadcaster<T> {
    subscribers: Vec<Subscriber<T>>,
}

impl<T: Clone> Broadcaster<T> {
    /// Create a broadcaster without subscribers
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Register a subscriber, optionally scoped to a path prefix
    pub fn subscribe(&mut self, filter: Option<DocPath>) -> Subscription<T> {
        let queue: Queue<T> = Arc::new(Mutex::new(VecDeque::new()));
        self.subscribers.push(Subscriber {
            filter,
            queue: Arc::downgrade(&queue),
        });
        Subscription { queue }
    }

    /// Deliver `item` to every subscriber whose filter passes `accepts`
    pub fn publish_where(&mut self, item: &T, mut accepts: impl FnMut(Option<&DocPath>) -> bool) {
        self.subscribers.retain(|subscriber| {
            let Some(queue) = subscriber.queue.upgrade() else {
                return false;
            };
            if accepts(subscriber.filter.as_ref()) {
                queue.lock().push_back(item.clone());
            }
            true
        });
    }

    /// Deliver `item` to every subscriber
    pub fn publish(&mut self, item: &T) {
        self.publish_where(item, |_| true);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .iter()
            .filter(|subscriber| subscriber.queue.strong_count() > 0)
            .count()
    }
}

impl Broadcaster<DocumentChange> {
    /// Deliver a document change to subscribers whose prefix it affects
    pub fn publish_change(&mut self, change: &DocumentChange) {
        self.publish_where(change, |filter| filter.map_or(true, |prefix| change.affects(prefix)));
    }
}

impl<T: Clone> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    #[test]
    fn test_affects_prefix() {
        let root = path("/Graph1");
        assert!(DocumentChange::NodeAdded(path("/Graph1/Add1")).affects(&root));
        assert!(!DocumentChange::NodeAdded(path("/Graph2/Add1")).affects(&root));
        assert!(DocumentChange::NodeRemoved(path("/Graph1")).affects(&path("/Graph1/Sub")));
        assert!(DocumentChange::NodeRenamed { old: path("/Graph1"), new: path("/G") }.affects(&root));
        assert!(DocumentChange::Reloaded.affects(&root));
    }

    #[test]
    fn test_filtered_delivery() {
        let mut broadcaster = Broadcaster::new();
        let scoped = broadcaster.subscribe(Some(path("/Graph1")));
        let everything = broadcaster.subscribe(None);

        broadcaster.publish_change(&DocumentChange::NodeAdded(path("/Graph2/X")));
        broadcaster.publish_change(&DocumentChange::NodeAdded(path("/Graph1/Y")));

        assert_eq!(scoped.drain(), vec![DocumentChange::NodeAdded(path("/Graph1/Y"))]);
        assert_eq!(everything.pending(), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let mut broadcaster: Broadcaster<u32> = Broadcaster::new();
        let first = broadcaster.subscribe(None);
        {
            let _second = broadcaster.subscribe(None);
            assert_eq!(broadcaster.subscriber_count(), 2);
        }
        broadcaster.publish(&7);
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(first.drain(), vec![7]);
    }
}
