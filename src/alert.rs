//! Process-wide alert log.
//!
//! Alerts are short human-readable policy-violation strings ("No face
//! detected", "Prohibited objects: ..."). The log is append-only and
//! ordered by capture time: entries are never removed or mutated once
//! appended. Readers only ever see a bounded window of the most recent
//! entries.
//!
//! The log is owned by the hosting process and injected into both the
//! pipeline (writer) and the query endpoint (reader), so appends and
//! snapshot reads may be concurrent.

use std::sync::Mutex;

/// How many entries the query endpoint exposes.
pub const RECENT_WINDOW: usize = 10;

/// Emitted when no face is visible.
pub const NO_FACE_ALERT: &str = "No face detected";

/// Emitted when more than one face is visible.
pub const MULTIPLE_FACES_ALERT: &str = "Multiple faces detected";

/// Prefix for the prohibited-objects alert; the comma-joined class names
/// follow in detector-output order.
pub const PROHIBITED_PREFIX: &str = "Prohibited objects: ";

/// Append-only, mutex-guarded alert log.
pub struct AlertLog {
    entries: Mutex<Vec<String>>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Append a batch of alerts in order. Called once per frame that
    /// produced alerts; the whole batch lands atomically so readers never
    /// observe a half-appended frame.
    pub fn append(&self, batch: &[String]) {
        if batch.is_empty() {
            return;
        }
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.extend_from_slice(batch);
    }

    /// Snapshot of the most recent `n` entries, oldest-to-newest. Returns
    /// fewer than `n` when fewer exist.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        let start = entries.len().saturating_sub(n);
        entries[start..].to_vec()
    }

    /// Total entries appended so far. Retention is unbounded (the log is
    /// the session record); hosts can watch this to track growth.
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new()
    }
}
