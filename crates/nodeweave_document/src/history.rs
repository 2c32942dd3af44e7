// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history of committed transactions.
//!
//! Each committed transaction is recorded as a pair of document snapshots
//! (before and after). Undo restores the `before` snapshot, redo the `after`
//! one, so a gesture made of many writes replays as a single step.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Default maximum undo depth
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Snapshot encoding failed
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Identifier of a recorded transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Raw id value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Encoded document state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Encoded state
    pub data: Vec<u8>,
    /// Timestamp when the snapshot was taken
    pub timestamp: u64,
}

impl StateSnapshot {
    /// Encode a serializable value
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            data: bincode::serialize(value)?,
            timestamp: now_secs(),
        })
    }

    /// Decode the snapshot
    pub fn to_value<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.data)?)
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// One committed transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Transaction id
    pub id: TransactionId,
    /// Label of the outermost transaction scope
    pub label: String,
    /// State before the transaction
    pub before: StateSnapshot,
    /// State after the transaction
    pub after: StateSnapshot,
}

impl HistoryEntry {
    fn memory_size(&self) -> usize {
        self.before.size() + self.after.size()
    }
}

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Entries in the undo stack
    pub undo_count: usize,
    /// Entries in the redo stack
    pub redo_count: usize,
    /// Bytes held by the undo stack
    pub memory_used: usize,
    /// Maximum depth
    pub max_depth: usize,
}

/// Undo/redo stacks
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    next_id: u64,
    max_depth: usize,
    memory_used: usize,
}

impl History {
    /// Create a history with the default depth
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    /// Create a history keeping at most `max_depth` entries
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            next_id: 1,
            max_depth: max_depth.max(1),
            memory_used: 0,
        }
    }

    /// Record a committed transaction; clears the redo stack
    pub fn record(
        &mut self,
        label: impl Into<String>,
        before: StateSnapshot,
        after: StateSnapshot,
    ) -> TransactionId {
        let id = TransactionId(self.next_id);
        self.next_id += 1;

        let entry = HistoryEntry {
            id,
            label: label.into(),
            before,
            after,
        };
        self.redo_stack.clear();
        self.memory_used += entry.memory_size();
        self.undo_stack.push_back(entry);

        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.memory_size());
            }
        }
        id
    }

    /// Pop the last entry onto the redo stack and return it
    pub fn undo(&mut self) -> Result<HistoryEntry> {
        let entry = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;
        self.memory_used = self.memory_used.saturating_sub(entry.memory_size());
        self.redo_stack.push_back(entry.clone());
        Ok(entry)
    }

    /// Pop the last undone entry back onto the undo stack and return it
    pub fn redo(&mut self) -> Result<HistoryEntry> {
        let entry = self.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)?;
        self.memory_used += entry.memory_size();
        self.undo_stack.push_back(entry.clone());
        Ok(entry)
    }

    /// Whether undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Label of the next undo step
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|entry| entry.label.as_str())
    }

    /// Label of the next redo step
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.back().map(|entry| entry.label.as_str())
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory_used = 0;
    }

    /// Current statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            max_depth: self.max_depth,
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
