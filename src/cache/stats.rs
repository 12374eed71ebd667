//! Cache Statistics Module
//!
//! Counters kept by the engine for the lifetime of one instance. They are not
//! persisted; a restarted engine starts from zero.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that found nothing, a corrupted record, or an expired entry
    pub misses: u64,
    /// Entries dropped to make room for a write
    pub evictions: u64,
    /// Entries removed because their expiry passed
    pub expired: u64,
    /// Keys resident in the backend, reserved records included
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expired(&mut self) {
        self.expired += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
