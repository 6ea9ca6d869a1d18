//! Snapshot-based undo/redo history.
//!
//! # Responsibility
//! - Record deep pre-images of the topic store before mutating operations.
//! - Walk a linear (non-branching) history with a bounded depth.
//!
//! # Invariants
//! - `entries.len() <= max_depth` after every call.
//! - When not empty, `cursor < entries.len()`.
//! - A save after an undo discards every entry ahead of the cursor.
//! - Snapshots share nothing with the live store; they never carry
//!   selection or editing flags.
//!
//! # Model
//! `entries[cursor]` is the snapshot the live state was derived from. While
//! `tip_pending` is set, the live state is newer than that entry and is not
//! recorded yet; the first `undo` stores it so `redo` can come back to it.

use crate::config::{HistoryConfig, MIN_HISTORY_DEPTH};
use crate::repo::topic_store::TopicStore;
use log::debug;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Immutable deep copy of a document's topic tree.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySnapshot {
    store: TopicStore,
}

impl HistorySnapshot {
    /// Captures `store` with transient flags cleared.
    pub fn capture(store: &TopicStore) -> Self {
        let mut store = store.clone();
        store.clear_transient();
        Self { store }
    }

    pub fn store(&self) -> &TopicStore {
        &self.store
    }

    pub fn into_store(self) -> TopicStore {
        self.store
    }
}

/// Linear undo/redo stack of snapshots.
#[derive(Debug)]
pub struct HistoryManager {
    entries: VecDeque<HistorySnapshot>,
    cursor: usize,
    tip_pending: bool,
    max_depth: usize,
    text_edit_interval: Duration,
    last_text_save: Option<Instant>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

impl HistoryManager {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            tip_pending: false,
            max_depth: config.max_depth.max(MIN_HISTORY_DEPTH),
            text_edit_interval: config.text_edit_interval(),
            last_text_save: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && (self.tip_pending || self.cursor > 0)
    }

    pub fn can_redo(&self) -> bool {
        !self.tip_pending && self.cursor + 1 < self.entries.len()
    }

    /// Pushes a pre-image, discarding any redo branch.
    pub fn save(&mut self, snapshot: HistorySnapshot) {
        self.last_text_save = None;
        self.push(snapshot);
    }

    /// Saves a text-edit pre-image at most once per configured interval.
    ///
    /// Returns whether a snapshot was recorded.
    pub fn save_coalesced(&mut self, snapshot: HistorySnapshot, now: Instant) -> bool {
        if let Some(last) = self.last_text_save {
            if now.saturating_duration_since(last) < self.text_edit_interval {
                return false;
            }
        }
        self.push(snapshot);
        self.last_text_save = Some(now);
        true
    }

    /// Steps back one snapshot.
    ///
    /// `current` is the live state; it is recorded the first time an undo
    /// leaves the tip so a later `redo` can restore it. Returns `None` at the
    /// earliest entry.
    pub fn undo(&mut self, current: HistorySnapshot) -> Option<HistorySnapshot> {
        if self.entries.is_empty() {
            return None;
        }
        self.last_text_save = None;

        if self.tip_pending {
            let restored = self.entries.get(self.cursor)?.clone();
            self.entries.truncate(self.cursor + 1);
            self.entries.push_back(current);
            self.tip_pending = false;
            self.evict_overflow();
            debug!(
                "event=history_undo module=history status=ok cursor={} len={}",
                self.cursor,
                self.entries.len()
            );
            return Some(restored);
        }

        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        debug!(
            "event=history_undo module=history status=ok cursor={} len={}",
            self.cursor,
            self.entries.len()
        );
        self.entries.get(self.cursor).cloned()
    }

    /// Steps forward one snapshot. Returns `None` at the latest entry.
    pub fn redo(&mut self) -> Option<HistorySnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.last_text_save = None;
        self.cursor += 1;
        debug!(
            "event=history_redo module=history status=ok cursor={} len={}",
            self.cursor,
            self.entries.len()
        );
        self.entries.get(self.cursor).cloned()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.tip_pending = false;
        self.last_text_save = None;
    }

    fn push(&mut self, snapshot: HistorySnapshot) {
        let keep = if self.entries.is_empty() {
            0
        } else if self.tip_pending {
            self.cursor + 1
        } else {
            self.cursor
        };
        self.entries.truncate(keep);
        self.entries.push_back(snapshot);
        self.cursor = self.entries.len() - 1;
        self.tip_pending = true;
        self.evict_overflow();
    }

    fn evict_overflow(&mut self) {
        while self.entries.len() > self.max_depth {
            self.entries.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
    }
}
