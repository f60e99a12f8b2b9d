//! Time-bounded query result cache.
//!
//! Explicit, content-addressed state: (query name + parameters) →
//! (stored-at, value). The TTL is owned by the caller; a hit must be
//! observably identical to recomputing, so only whole result values are
//! ever stored.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct TtlCache<V> {
    ttl: Duration,
    entries: HashMap<String, (Instant, V)>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached value unless the entry is absent or older than
    /// the TTL. A zero TTL disables caching entirely.
    pub fn get(&self, key: &str) -> Option<V> {
        let (stored_at, value) = self.entries.get(key)?;
        if stored_at.elapsed() < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), (Instant::now(), value));
    }

    /// Drop everything. Callers use this after an ingestion run so stale
    /// results cannot outlive the data they were computed from.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
