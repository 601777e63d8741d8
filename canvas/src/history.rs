//! Linear undo/redo history over full document snapshots.
//!
//! The stack always holds at least one entry (the state the document started
//! from). `index` points at the entry matching the live document. Pushing after
//! an undo discards the redo branch; exceeding the limit evicts the oldest
//! entry and shifts the cursor down so it still points at the same snapshot.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use crate::doc::Snapshot;

/// Smallest useful history: the base state plus one undoable step.
const MIN_LIMIT: usize = 2;

#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Snapshot>,
    index: usize,
    limit: usize,
}

impl History {
    /// Start a history whose only entry is `initial`.
    #[must_use]
    pub fn new(initial: Snapshot, limit: usize) -> Self {
        let mut entries = VecDeque::with_capacity(limit.max(MIN_LIMIT));
        entries.push_back(initial);
        Self { entries, index: 0, limit: limit.max(MIN_LIMIT) }
    }

    /// Drop every entry and start again from `initial`.
    pub fn reset(&mut self, initial: Snapshot) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.index = 0;
    }

    /// Record a new current state.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.truncate(self.index + 1);
        self.entries.push_back(snapshot);
        self.index += 1;
        if self.entries.len() > self.limit {
            self.entries.pop_front();
            self.index -= 1;
        }
        tracing::trace!(entries = self.entries.len(), index = self.index, "history push");
    }

    /// Step back one entry, returning the snapshot to restore.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index)
    }

    /// Step forward one entry, returning the snapshot to restore.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// The entry matching the live document.
    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.index)
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}
