//! Per-session result cache (§9 design note: the reference architecture's
//! global in-process dictionaries for per-session logs/results become an
//! owned store, keyed by session identifier, with an explicit eviction
//! policy).
//!
//! [`SessionStore`] holds the most recently produced run outcomes so a
//! caller can fetch `results`/`workflow_stats` again by `session_id`
//! (§6) without recomputing the run. It is owned by
//! [`crate::service::PipelineService`], never reached for through global
//! mutable state.

use crate::model::{Article, RunStats};
use std::collections::HashMap;
use std::time::Instant;

/// One cached run outcome.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub articles: Vec<Article>,
    pub stats: RunStats,
    last_touched: Instant,
}

/// Bounded, last-touched-eviction cache of recent run outcomes.
///
/// Grounded on the reference architecture's TTL cache repository
/// (`repositories/cache.rs`), simplified to a size cap instead of a TTL:
/// this pipeline's sessions are meant to be fetched shortly after the run
/// that produced them, not held indefinitely.
pub struct SessionStore {
    entries: HashMap<String, SessionEntry>,
    capacity: usize,
}

impl SessionStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert or replace the entry for `session_id`, evicting the
    /// least-recently-touched entry first if at capacity.
    pub fn insert(&mut self, session_id: String, articles: Vec<Article>, stats: RunStats) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&session_id) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_touched)
                .map(|(id, _)| id.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(
            session_id,
            SessionEntry {
                articles,
                stats,
                last_touched: Instant::now(),
            },
        );
    }

    /// Fetch a session's cached outcome, refreshing its last-touched time.
    pub fn get(&mut self, session_id: &str) -> Option<&SessionEntry> {
        let entry = self.entries.get_mut(session_id)?;
        entry.last_touched = Instant::now();
        Some(&*entry)
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
    use crate::model::RunStats;

    #[test]
    fn evicts_least_recently_touched_entry_at_capacity() {
        let mut store = SessionStore::new(2);
        store.insert("a".to_string(), Vec::new(), RunStats::default());
        store.insert("b".to_string(), Vec::new(), RunStats::default());
        // Touch "a" so "b" becomes the least-recently-touched entry.
        assert!(store.get("a").is_some());
        store.insert("c".to_string(), Vec::new(), RunStats::default());

        assert_eq!(store.len(), 2);
        assert!(store.get("b").is_none());
        assert!(store.get("a").is_some());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn replacing_an_existing_key_does_not_evict() {
        let mut store = SessionStore::new(1);
        store.insert("a".to_string(), Vec::new(), RunStats::default());
        store.insert("a".to_string(), Vec::new(), RunStats { collected: 5, ..Default::default() });
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().stats.collected, 5);
    }
}
