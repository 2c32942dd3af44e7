// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application-wide selection service.

use crate::change::{Broadcaster, Subscription};
use crate::path::DocPath;
use std::cell::RefCell;
use std::rc::Rc;

/// Bidirectional selection service shared by every editor window
pub trait SelectionService {
    /// Currently selected document paths
    fn selected_paths(&self) -> Vec<DocPath>;

    /// Replace the selection; subscribers are notified when it changes
    fn set_selected_paths(&mut self, paths: Vec<DocPath>);

    /// Observe selection changes. Each notification is the full new selection.
    fn subscribe(&mut self) -> Subscription<Vec<DocPath>>;
}

/// Shared, single-threaded handle to a selection service
pub type SelectionHandle = Rc<RefCell<dyn SelectionService>>;

/// Simple in-memory selection service
#[derive(Default)]
pub struct MemorySelection {
    paths: Vec<DocPath>,
    broadcaster: Broadcaster<Vec<DocPath>>,
}

impl MemorySelection {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionService for MemorySelection {
    fn selected_paths(&self) -> Vec<DocPath> {
        self.paths.clone()
    }

    fn set_selected_paths(&mut self, paths: Vec<DocPath>) {
        if paths == self.paths {
            return;
        }
        self.paths = paths;
        self.broadcaster.publish(&self.paths);
    }

    fn subscribe(&mut self) -> Subscription<Vec<DocPath>> {
        self.broadcaster.subscribe(None)
    }
}
