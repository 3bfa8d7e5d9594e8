use std::collections::VecDeque;

use chrono::Utc;

/// Maximum number of entries retained before the oldest is dropped (§4.9).
const MAX_ENTRIES: usize = 1024;

/// Append-only, bounded trace of one instruction's progress. Timestamps
/// each entry with RFC-3339 millisecond precision in UTC. `snapshot()`
/// returns a stable copy with no shared mutation.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: VecDeque<String>,
    dropped: u64,
}

impl ExecutionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry, timestamping it now. Drops the oldest entry
    /// (recording the fact in `dropped`) once the buffer is full.
    pub fn push(&mut self, entry: impl Into<String>) {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        self.entries.push_back(format!("[{timestamp}] {}", entry.into()));
        if self.entries.len() > MAX_ENTRIES {
            self.entries.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    /// Append several entries in order, each timestamped independently.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = String>) {
        for entry in entries {
            self.push(entry);
        }
    }

    /// Number of entries dropped to stay within [`MAX_ENTRIES`].
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// A stable copy of the log's current contents, in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    /// Clear the log. Called by the Workflow Loop when an instruction
    /// completes.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_timestamped() {
        let mut log = ExecutionLog::new();
        log.push("starting install");
        let snap = log.snapshot();
        assert_eq!(snap.len(), 1);
        assert!(snap[0].starts_with('['));
        assert!(snap[0].ends_with("starting install"));
    }

    #[test]
    fn append_order_is_preserved() {
        let mut log = ExecutionLog::new();
        log.push("one");
        log.push("two");
        log.push("three");
        let snap = log.snapshot();
        assert!(snap[0].ends_with("one"));
        assert!(snap[1].ends_with("two"));
        assert!(snap[2].ends_with("three"));
    }

    #[test]
    fn oldest_is_dropped_once_full() {
        let mut log = ExecutionLog::new();
        for i in 0..MAX_ENTRIES + 5 {
            log.push(format!("entry-{i}"));
        }
        assert_eq!(log.len(), MAX_ENTRIES);
        assert_eq!(log.dropped_count(), 5);
        let snap = log.snapshot();
        assert!(snap[0].ends_with("entry-5"));
    }

    #[test]
    fn clear_resets_state() {
        let mut log = ExecutionLog::new();
        log.push("a");
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.dropped_count(), 0);
    }
}
