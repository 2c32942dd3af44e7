// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory document store.
//!
//! `MemoryDocument` implements [`DocumentAdapter`] on top of an ordered map
//! of nodes. It keeps a clone of the pre-transaction state for rollback,
//! records bincode snapshots in the undo [`History`], buffers change
//! notifications until the outermost commit and can be loaded from or saved
//! to RON.

use crate::adapter::{DocumentAdapter, DocumentError, Result};
use crate::change::{Broadcaster, DocumentChange, Subscription};
use crate::history::{History, StateSnapshot};
use crate::node::{DocumentNode, NodeMetadata, Property};
use crate::path::{is_valid_name, DocPath, PathError, PropertyPath};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current document file format version
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Complete document contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DocumentState {
    nodes: IndexMap<DocPath, DocumentNode>,
    terminals: IndexMap<DocPath, DocPath>,
}

impl DocumentState {
    fn new() -> Self {
        let mut nodes = IndexMap::new();
        nodes.insert(DocPath::root(), DocumentNode::new(DocPath::root(), ""));
        Self {
            nodes,
            terminals: IndexMap::new(),
        }
    }
}

/// On-disk representation. Child lists are rebuilt from the node order.
#[derive(Debug, Serialize, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    version: u32,
    nodes: Vec<DocumentNode>,
    #[serde(default)]
    terminals: IndexMap<DocPath, DocPath>,
}

struct OpenTransaction {
    label: String,
    depth: usize,
    before: DocumentState,
    changes: Vec<DocumentChange>,
    aborted: bool,
    dirty: bool,
}

/// Transaction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    /// Outermost transactions committed
    pub committed: u64,
    /// Outermost transactions rolled back or aborted
    pub rolled_back: u64,
}

/// Reference in-memory implementation of [`DocumentAdapter`]
pub struct MemoryDocument {
    state: DocumentState,
    transaction: Option<OpenTransaction>,
    history: History,
    broadcaster: Broadcaster<DocumentChange>,
    read_only: bool,
    locked: Vec<DocPath>,
    stats: DocumentStats,
}

impl MemoryDocument {
    /// Create an empty document holding only the pseudo-root
    pub fn new() -> Self {
        Self::with_history(History::new())
    }

    /// Create an empty document with a custom undo depth
    pub fn with_history_depth(max_depth: usize) -> Self {
        Self::with_history(History::with_max_depth(max_depth))
    }

    fn with_history(history: History) -> Self {
        Self {
            state: DocumentState::new(),
            transaction: None,
            history,
            broadcaster: Broadcaster::new(),
            read_only: false,
            locked: Vec::new(),
            stats: DocumentStats::default(),
        }
    }

    /// Parse a document from RON text
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let mut document = Self::new();
        document.state = Self::parse_state(content)?;
        Ok(document)
    }

    /// Load a document from a RON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let document = Self::from_ron_str(&content)?;
        tracing::info!("Loaded document {:?} ({} nodes)", path, document.node_count());
        Ok(document)
    }

    /// Serialize the document to RON text
    pub fn to_ron_string(&self) -> Result<String> {
        let file = DocumentFile {
            version: DOCUMENT_FORMAT_VERSION,
            nodes: self
                .state
                .nodes
                .values()
                .filter(|node| !node.path.is_root())
                .cloned()
                .map(|mut node| {
                    node.children.clear();
                    node
                })
                .collect(),
            terminals: self.state.terminals.clone(),
        };
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        ron::ser::to_string_pretty(&file, config).map_err(|e| DocumentError::Format(e.to_string()))
    }

    /// Save the document to a RON file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron_string()?)?;
        tracing::info!("Saved document {:?}", path);
        Ok(())
    }

    /// Replace the whole document, as when reloading from disk.
    ///
    /// Clears the undo history and notifies every subscriber.
    pub fn reload_from_str(&mut self, content: &str) -> Result<()> {
        if self.transaction.is_some() {
            return Err(DocumentError::TransactionActive);
        }
        self.state = Self::parse_state(content)?;
        self.history.clear();
        self.broadcaster.publish_change(&DocumentChange::Reloaded);
        tracing::info!("Document reloaded ({} nodes)", self.node_count());
        Ok(())
    }

    fn parse_state(content: &str) -> Result<DocumentState> {
        let file: DocumentFile =
            ron::from_str(content).map_err(|e| DocumentError::Format(e.to_string()))?;
        if file.version > DOCUMENT_FORMAT_VERSION {
            return Err(DocumentError::Format(format!(
                "Document version {} is newer than supported version {}",
                file.version, DOCUMENT_FORMAT_VERSION
            )));
        }

        let mut state = DocumentState::new();
        for mut node in file.nodes {
            let parent = node
                .path
                .parent()
                .ok_or_else(|| PathError::InvalidPath(node.path.to_string()))?;
            if state.nodes.contains_key(&node.path) {
                return Err(DocumentError::NodeExists(node.path));
            }
            let Some(parent_node) = state.nodes.get_mut(&parent) else {
                return Err(DocumentError::NodeNotFound(parent));
            };
            parent_node.children.push(node.path.name().to_string());
            node.children.clear();
            state.nodes.insert(node.path.clone(), node);
        }
        state.terminals = file.terminals;
        Ok(state)
    }

    /// Run `edit` inside one transaction, committing on success
    pub fn edit<T>(&mut self, label: &str, edit: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.begin_transaction(label)?;
        match edit(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    /// Reject every write
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Reject writes to `path` and its subtree
    pub fn lock(&mut self, path: DocPath) {
        if !self.locked.contains(&path) {
            self.locked.push(path);
        }
    }

    /// Lift a lock set with [`MemoryDocument::lock`]
    pub fn unlock(&mut self, path: &DocPath) {
        self.locked.retain(|locked| locked != path);
    }

    /// Drop the undo history
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Undo history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Transaction counters
    pub fn stats(&self) -> DocumentStats {
        self.stats
    }

    /// Number of nodes, excluding the pseudo-root
    pub fn node_count(&self) -> usize {
        self.state.nodes.len().saturating_sub(1)
    }

    /// Whether a node exists at `path`
    pub fn contains(&self, path: &DocPath) -> bool {
        self.state.nodes.contains_key(path)
    }

    fn check_writable(&self, path: &DocPath) -> Result<()> {
        if self.transaction.is_none() {
            return Err(DocumentError::NoTransaction);
        }
        if self.read_only || self.locked.iter().any(|locked| path.has_prefix(locked)) {
            return Err(DocumentError::ReadOnly(path.clone()));
        }
        Ok(())
    }

    fn record(&mut self, change: DocumentChange) {
        if let Some(transaction) = &mut self.transaction {
            transaction.dirty = true;
            transaction.changes.push(change);
        }
    }

    fn node_mut(&mut self, path: &DocPath) -> Result<&mut DocumentNode> {
        self.state
            .nodes
            .get_mut(path)
            .ok_or_else(|| DocumentError::NodeNotFound(path.clone()))
    }

    fn property_mut(&mut self, path: &PropertyPath) -> Result<&mut Property> {
        self.state
            .nodes
            .get_mut(&path.node)
            .and_then(|node| node.properties.get_mut(&path.name))
            .ok_or_else(|| DocumentError::PropertyNotFound(path.clone()))
    }

    fn has_property(&self, path: &PropertyPath) -> bool {
        self.state
            .nodes
            .get(&path.node)
            .is_some_and(|node| node.properties.contains_key(&path.name))
    }

    fn restore(&mut self, transaction: OpenTransaction) {
        self.state = transaction.before;
        self.stats.rolled_back += 1;
        tracing::debug!(
            "Rolled back transaction '{}' ({} changes discarded)",
            transaction.label,
            transaction.changes.len()
        );
    }

    fn apply_snapshot(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        self.state = snapshot.to_value()?;
        self.broadcaster.publish_change(&DocumentChange::Reloaded);
        Ok(())
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAdapter for MemoryDocument {
    fn get_node(&self, path: &DocPath) -> Option<DocumentNode> {
        self.state.nodes.get(path).cloned()
    }

    fn get_children(&self, path: &DocPath) -> Vec<DocumentNode> {
        let Some(node) = self.state.nodes.get(path) else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter_map(|name| path.child(name).ok())
            .filter_map(|child| self.state.nodes.get(&child).cloned())
            .collect()
    }

    fn get_properties(&self, path: &DocPath) -> Vec<Property> {
        self.state
            .nodes
            .get(path)
            .map(|node| node.properties.values().cloned().collect())
            .unwrap_or_default()
    }

    fn subscribe(&mut self, prefix: &DocPath) -> Subscription<DocumentChange> {
        self.broadcaster.subscribe(Some(prefix.clone()))
    }

    fn begin_transaction(&mut self, label: &str) -> Result<()> {
        match &mut self.transaction {
            Some(transaction) => transaction.depth += 1,
            None => {
                self.transaction = Some(OpenTransaction {
                    label: label.to_string(),
                    depth: 1,
                    before: self.state.clone(),
                    changes: Vec::new(),
                    aborted: false,
                    dirty: false,
                });
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let Some(transaction) = &mut self.transaction else {
            return Err(DocumentError::NoTransaction);
        };
        transaction.depth -= 1;
        if transaction.depth > 0 {
            return Ok(());
        }
        let Some(transaction) = self.transaction.take() else {
            return Err(DocumentError::NoTransaction);
        };

        if transaction.aborted {
            let label = transaction.label.clone();
            self.restore(transaction);
            return Err(DocumentError::Aborted(label));
        }

        if transaction.dirty {
            let snapshots = StateSnapshot::from_value(&transaction.before)
                .and_then(|before| Ok((before, StateSnapshot::from_value(&self.state)?)));
            let (before, after) = match snapshots {
                Ok(pair) => pair,
                Err(e) => {
                    self.restore(transaction);
                    return Err(e.into());
                }
            };
            self.history.record(transaction.label.clone(), before, after);
            for change in &transaction.changes {
                self.broadcaster.publish_change(change);
            }
        }

        self.stats.committed += 1;
        tracing::debug!(
            "Committed transaction '{}' ({} changes)",
            transaction.label,
            transaction.changes.len()
        );
        Ok(())
    }

    fn rollback(&mut self) {
        let Some(transaction) = &mut self.transaction else {
            tracing::warn!("Rollback requested with no open transaction");
            return;
        };
        if transaction.depth > 1 {
            transaction.depth -= 1;
            transaction.aborted = true;
            return;
        }
        if let Some(transaction) = self.transaction.take() {
            self.restore(transaction);
        }
    }

    fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    fn transaction_count(&self) -> u64 {
        self.stats.committed
    }

    fn set_terminal(&mut self, root: &DocPath, node: Option<&DocPath>) -> Result<()> {
        self.check_writable(root)?;
        if !self.contains(root) {
            return Err(DocumentError::NodeNotFound(root.clone()));
        }
        if let Some(node) = node {
            if !self.contains(node) || !node.has_prefix(root) || node == root {
                return Err(DocumentError::NodeNotFound(node.clone()));
            }
        }

        let current = self.state.terminals.get(root);
        if current == node {
            return Ok(());
        }
        match node {
            Some(node) => {
                self.state.terminals.insert(root.clone(), node.clone());
            }
            None => {
                self.state.terminals.shift_remove(root);
            }
        }
        self.record(DocumentChange::TerminalChanged { root: root.clone() });
        Ok(())
    }

    fn get_terminal(&self, root: &DocPath) -> Option<DocPath> {
        self.state.terminals.get(root).cloned()
    }

    fn create_node(&mut self, path: &DocPath, type_name: &str) -> Result<()> {
        self.check_writable(path)?;
        let parent = path
            .parent()
            .ok_or_else(|| PathError::InvalidPath(path.to_string()))?;
        if self.contains(path) {
            return Err(DocumentError::NodeExists(path.clone()));
        }
        self.node_mut(&parent)?.children.push(path.name().to_string());
        self.state
            .nodes
            .insert(path.clone(), DocumentNode::new(path.clone(), type_name));
        self.record(DocumentChange::NodeAdded(path.clone()));
        Ok(())
    }

    fn remove_node(&mut self, path: &DocPath) -> Result<()> {
        self.check_writable(path)?;
        let parent = path
            .parent()
            .ok_or_else(|| PathError::InvalidPath(path.to_string()))?;
        if !self.contains(path) {
            return Err(DocumentError::NodeNotFound(path.clone()));
        }

        let name = path.name().to_string();
        self.node_mut(&parent)?.children.retain(|child| *child != name);
        self.state.nodes.retain(|key, _| !key.has_prefix(path));
        self.state.terminals.retain(|root, _| !root.has_prefix(path));
        self.record(DocumentChange::NodeRemoved(path.clone()));

        // Terminals and connection sources elsewhere must not point into the removed subtree
        let orphaned_terminals: Vec<DocPath> = self
            .state
            .terminals
            .iter()
            .filter(|(_, node)| node.has_prefix(path))
            .map(|(root, _)| root.clone())
            .collect();
        for root in orphaned_terminals {
            self.state.terminals.shift_remove(&root);
            self.record(DocumentChange::TerminalChanged { root });
        }

        let mut stripped = Vec::new();
        for (key, node) in &mut self.state.nodes {
            for property in node.properties.values_mut() {
                let before = property.connections.len();
                property.connections.retain(|source| !source.node.has_prefix(path));
                if property.connections.len() != before {
                    stripped.push(PropertyPath::new(key.clone(), property.name.clone()));
                }
            }
        }
        for property in stripped {
            self.record(DocumentChange::PropertyChanged(property));
        }
        Ok(())
    }

    fn rename_node(&mut self, path: &DocPath, new_name: &str) -> Result<DocPath> {
        self.check_writable(path)?;
        if !is_valid_name(new_name) {
            return Err(PathError::InvalidName(new_name.to_string()).into());
        }
        let parent = path
            .parent()
            .ok_or_else(|| PathError::InvalidPath(path.to_string()))?;
        if !self.contains(path) {
            return Err(DocumentError::NodeNotFound(path.clone()));
        }
        let new_path = parent.child(new_name)?;
        if new_path == *path {
            return Ok(new_path);
        }
        if self.contains(&new_path) {
            return Err(DocumentError::NodeExists(new_path));
        }

        let old_name = path.name().to_string();
        for child in &mut self.node_mut(&parent)?.children {
            if *child == old_name {
                *child = new_name.to_string();
            }
        }

        let retarget = |p: &DocPath| p.replace_prefix(path, &new_path).unwrap_or_else(|| p.clone());
        let nodes = std::mem::take(&mut self.state.nodes);
        self.state.nodes = nodes
            .into_iter()
            .map(|(key, mut node)| {
                let key = retarget(&key);
                node.path = key.clone();
                for property in node.properties.values_mut() {
                    for source in &mut property.connections {
                        source.node = retarget(&source.node);
                    }
                }
                (key, node)
            })
            .collect();
        let terminals = std::mem::take(&mut self.state.terminals);
        self.state.terminals = terminals
            .into_iter()
            .map(|(root, node)| (retarget(&root), retarget(&node)))
            .collect();

        self.record(DocumentChange::NodeRenamed {
            old: path.clone(),
            new: new_path.clone(),
        });
        Ok(new_path)
    }

    fn set_metadata(&mut self, path: &DocPath, metadata: NodeMetadata) -> Result<()> {
        self.check_writable(path)?;
        let node = self.node_mut(path)?;
        if node.metadata == metadata {
            return Ok(());
        }
        node.metadata = metadata;
        self.record(DocumentChange::MetadataChanged(path.clone()));
        Ok(())
    }

    fn create_property(&mut self, path: &DocPath, property: Property) -> Result<()> {
        self.check_writable(path)?;
        let property_path = PropertyPath::new(path.clone(), property.name.clone());
        let node = self.node_mut(path)?;
        if node.properties.contains_key(&property.name) {
            return Err(DocumentError::PropertyExists(property_path));
        }
        node.properties.insert(property.name.clone(), property);
        self.record(DocumentChange::PropertyChanged(property_path));
        Ok(())
    }

    fn add_connection(&mut self, target: &PropertyPath, source: &PropertyPath) -> Result<()> {
        self.check_writable(&target.node)?;
        if !self.has_property(source) {
            return Err(DocumentError::PropertyNotFound(source.clone()));
        }
        let property = self.property_mut(target)?;
        if property.connections.contains(source) {
            return Ok(());
        }
        property.connections.push(source.clone());
        self.record(DocumentChange::PropertyChanged(target.clone()));
        Ok(())
    }

    fn remove_connection(&mut self, target: &PropertyPath, source: &PropertyPath) -> Result<()> {
        self.check_writable(&target.node)?;
        let property = self.property_mut(target)?;
        let before = property.connections.len();
        property.connections.retain(|existing| existing != source);
        if property.connections.len() != before {
            self.record(DocumentChange::PropertyChanged(target.clone()));
        }
        Ok(())
    }

    fn undo(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Err(DocumentError::TransactionActive);
        }
        let entry = self.history.undo()?;
        self.apply_snapshot(&entry.before)?;
        tracing::info!("Undo: {}", entry.label);
        Ok(())
    }

    fn redo(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Err(DocumentError::TransactionActive);
        }
        let entry = self.history.redo()?;
        self.apply_snapshot(&entry.after)?;
        tracing::info!("Redo: {}", entry.label);
        Ok(())
    }

    fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}
