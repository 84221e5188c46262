//! Bounded undo/redo over whole-document snapshots.

use crate::document::{DocumentHandle, DocumentSnapshot};
use std::collections::VecDeque;
use std::time::SystemTime;

/// Default number of entries kept on each stack.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// A snapshot of document state for undo/redo.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub snapshot: DocumentSnapshot,
    /// Name of the user action, e.g. "move selection".
    pub label: String,
    pub timestamp: SystemTime,
}

/// Undo and redo stacks of document snapshots.
///
/// Only locally initiated actions are recorded; the caller decides the
/// granularity (one entry per user action).
pub struct HistoryEngine {
    document: DocumentHandle,
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryEngine {
    pub fn new(document: DocumentHandle) -> Self {
        Self::with_capacity(document, DEFAULT_HISTORY_CAPACITY)
    }

    /// Create an engine keeping at most `capacity` entries per stack.
    pub fn with_capacity(document: DocumentHandle, capacity: usize) -> Self {
        Self {
            document,
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Capture the current document state without recording it.
    ///
    /// Pair with [`push`](Self::push) once the action has committed.
    pub fn capture(&self, label: impl Into<String>) -> HistoryEntry {
        HistoryEntry {
            snapshot: self.document.snapshot(),
            label: label.into(),
            timestamp: SystemTime::now(),
        }
    }

    /// Record a captured entry. Clears the redo stack.
    pub fn push(&mut self, entry: HistoryEntry) {
        log::debug!("History: recorded \"{}\"", entry.label);
        push_bounded(&mut self.undo_stack, entry, self.capacity);
        self.redo_stack.clear();
    }

    /// Capture and record the current document state in one step.
    pub fn snapshot(&mut self, label: impl Into<String>) {
        let entry = self.capture(label);
        self.push(entry);
    }

    /// Undo the last recorded action.
    /// Returns true if undo was performed, false if nothing to undo or the
    /// entry could not be restored.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_stack.pop_back() else {
            return false;
        };
        let current = self.capture(entry.label.clone());

        match self.document.restore(&entry.snapshot) {
            Ok(()) => {
                push_bounded(&mut self.redo_stack, current, self.capacity);
                true
            }
            Err(e) => {
                log::warn!("Dropping undo entry \"{}\": {}", entry.label, e);
                false
            }
        }
    }

    /// Redo the last undone action.
    /// Returns true if redo was performed.
    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.redo_stack.pop_back() else {
            return false;
        };
        let current = self.capture(entry.label.clone());

        match self.document.restore(&entry.snapshot) {
            Ok(()) => {
                push_bounded(&mut self.undo_stack, current, self.capacity);
                true
            }
            Err(e) => {
                log::warn!("Dropping redo entry \"{}\": {}", entry.label, e);
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Label of the action the next undo reverts.
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|entry| entry.label.as_str())
    }

    /// Label of the action the next redo reapplies.
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.back().map(|entry| entry.label.as_str())
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

fn push_bounded(stack: &mut VecDeque<HistoryEntry>, entry: HistoryEntry, capacity: usize) {
    stack.push_back(entry);
    while stack.len() > capacity {
        stack.pop_front();
    }
}
