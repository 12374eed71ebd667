//! Cache Store Module
//!
//! Main cache engine combining a quota-limited backend with the persisted
//! recency queue and expiration.
//!
//! Every tracked operation is total: backend and serialization failures are
//! logged and turned into `None` or a no-op, never surfaced to the caller.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::cache::codec;
use crate::cache::{CacheEntry, CacheStats, Expiry, RecencyQueue, StoredValue};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Evictions a single forced write may perform by default.
pub const DEFAULT_MAX_RETRY: usize = 15;

/// Key written and read back once at construction to probe the backend.
pub const PROBE_KEY: &str = "__probe__";

// == Store Status ==
/// Snapshot reported by [`CacheStore::status`].
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    /// Keys currently tracked for eviction
    pub queue_count: usize,
    /// Whether the backend passed the start-up probe
    pub enabled: bool,
    #[serde(flatten)]
    pub stats: CacheStats,
}

// == Cache Store ==
/// LRU cache engine over a quota-limited [`Backend`].
///
/// The engine is synchronous and performs no locking; callers sharing it
/// across tasks must wrap the whole value in a single lock.
pub struct CacheStore<B: Backend> {
    /// Physical storage
    backend: B,
    /// Persisted LRU order
    queue: RecencyQueue,
    /// Performance statistics
    stats: CacheStats,
    /// Eviction budget per forced write
    max_retry: usize,
    /// Start-up probe result
    enabled: bool,
}

impl<B: Backend> CacheStore<B> {
    // == Constructor ==
    /// Creates an engine over `backend` with the default eviction budget.
    pub fn new(backend: B) -> Self {
        Self::with_max_retry(backend, DEFAULT_MAX_RETRY)
    }

    /// Creates an engine allowing at most `max_retry` evictions per write.
    pub fn with_max_retry(mut backend: B, max_retry: usize) -> Self {
        let enabled = probe(&mut backend);
        if enabled {
            debug!(max_retry, "Cache store initialized");
        } else {
            warn!("Backend failed the start-up probe, running in best-effort mode");
        }

        Self {
            backend,
            queue: RecencyQueue::new(),
            stats: CacheStats::new(),
            max_retry,
            enabled,
        }
    }

    /// Creates an engine using the eviction budget from `config`.
    pub fn from_config(backend: B, config: &Config) -> Self {
        Self::with_max_retry(backend, config.max_retry)
    }

    // == Set ==
    /// Stores `value` under `key`, evicting old entries if the write does not fit.
    ///
    /// Returns the value back on success, `None` if it could not be stored.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T, expire: impl Into<Expiry>) -> Option<T> {
        self.set_with_force(key, value, expire, true)
    }

    /// Stores `value` under `key`.
    ///
    /// When the backend rejects the write and `force` is set, the least
    /// recently used keys are evicted one at a time, retrying the write after
    /// each, for at most `max_retry` evictions. Without `force` nothing is
    /// evicted.
    ///
    /// Reserved keys and the empty key are refused.
    pub fn set_with_force<T: Serialize>(
        &mut self,
        key: &str,
        value: T,
        expire: impl Into<Expiry>,
        force: bool,
    ) -> Option<T> {
        if self.is_reserved(key) {
            warn!(key, "Refusing to overwrite a reserved key");
            return None;
        }
        // An empty key and an empty queue share one encoding
        if key.is_empty() {
            warn!("Refusing to track an empty key");
            return None;
        }

        let entry = CacheEntry::new(&value, expire.into());
        let wire = match codec::serialize(&entry) {
            Ok(wire) => wire,
            Err(error) => {
                warn!(key, %error, "Value could not be serialized");
                return None;
            }
        };

        let mut evictions = 0;
        loop {
            let error = match self.backend.set_item(key, &wire) {
                Ok(()) => {
                    self.queue.touch(&mut self.backend, key);
                    debug!(key, evictions, "Entry stored");
                    return Some(value);
                }
                Err(error) => error,
            };

            if !force {
                debug!(key, %error, "Write rejected");
                return None;
            }
            if evictions >= self.max_retry {
                warn!(key, evictions, %error, "Eviction budget exhausted, write dropped");
                return None;
            }
            let Some(victim) = self.queue.shift(&mut self.backend) else {
                warn!(key, evictions, %error, "Nothing left to evict, write dropped");
                return None;
            };

            if let Err(error) = self.backend.remove_item(&victim) {
                warn!(key = %victim, %error, "Failed to remove evicted entry");
            }
            evictions += 1;
            self.stats.record_eviction();
            info!(victim = %victim, key, "Evicted least recently used entry");
        }
    }

    // == Get ==
    /// Retrieves the value stored under `key`.
    ///
    /// Expired entries are removed and read as `None`. A hit refreshes the
    /// key's recency.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        if self.is_reserved(key) {
            return None;
        }

        let Some(stored) = self.read(key) else {
            self.stats.record_miss();
            return None;
        };

        if stored.expiry().is_expired() {
            debug!(key, "Entry expired");
            self.remove(key);
            self.stats.record_expired();
            self.stats.record_miss();
            return None;
        }

        let value = stored.into_value();
        if value.is_null() {
            self.stats.record_miss();
            return None;
        }

        self.queue.touch(&mut self.backend, key);
        self.stats.record_hit();
        Some(value)
    }

    /// Retrieves and deserializes the value stored under `key`.
    ///
    /// A value of the wrong shape reads as `None`.
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(error) => {
                debug!(key, %error, "Stored value has an unexpected shape");
                None
            }
        }
    }

    // == Remove ==
    /// Removes `key` from the queue and from storage. Absent keys are a no-op.
    pub fn remove(&mut self, key: &str) {
        self.queue.remove(&mut self.backend, key);
        if let Err(error) = self.backend.remove_item(key) {
            warn!(key, %error, "Failed to remove entry");
        }
    }

    // == Enumeration ==
    /// Decodes every resident record, the queue's own record included.
    ///
    /// Corrupted records map to `null`.
    pub fn get_all(&self) -> HashMap<String, Value> {
        let mut all = HashMap::with_capacity(self.backend.len());
        self.for_each(|key, value| {
            all.insert(key.to_string(), value.unwrap_or(Value::Null));
        });
        all
    }

    /// Calls `f` with every resident key and its decoded record, in backend order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, Option<Value>),
    {
        for index in 0..self.backend.len() {
            if let Some(key) = self.backend.key(index) {
                let decoded = self
                    .backend
                    .get_item(&key)
                    .and_then(|raw| codec::deserialize(&raw));
                f(&key, decoded);
            }
        }
    }

    // == Status ==
    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            queue_count: self.queue_count(),
            enabled: self.enabled,
            stats: self.stats(),
        }
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.backend.len());
        stats
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Tracked keys, least recently used first.
    pub fn queue(&self) -> Vec<String> {
        self.queue.load(&self.backend)
    }

    pub fn queue_count(&self) -> usize {
        self.queue.len(&self.backend)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // == Untracked Access ==
    /// Writes `value` as plain JSON without expiry or recency tracking.
    ///
    /// The key stays out of the queue, and so cannot be evicted, until it is
    /// read through [`CacheStore::get`], which starts tracking it.
    pub fn set_item<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        if self.is_reserved(key) {
            return Err(CacheError::InvalidRequest(format!("'{}' is reserved", key)));
        }
        let encoded = codec::encode_plain(value)?;
        self.backend.set_item(key, &encoded)?;
        Ok(())
    }

    /// Reads and decodes a record without touching recency or expiry.
    pub fn get_item(&self, key: &str) -> Option<Value> {
        self.backend
            .get_item(key)
            .and_then(|raw| codec::deserialize(&raw))
    }

    /// Removes a record from storage only.
    pub fn remove_item(&mut self, key: &str) {
        if let Err(error) = self.backend.remove_item(key) {
            warn!(key, %error, "Failed to remove item");
        }
    }

    /// Empties the backend, queue included.
    pub fn clear(&mut self) {
        match self.backend.clear() {
            Ok(()) => info!("Cache cleared"),
            Err(error) => warn!(%error, "Failed to clear backend"),
        }
    }

    // == Purge Expired ==
    /// Removes every resident entry whose expiry has passed.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = crate::cache::current_timestamp_ms();
        let mut expired_keys = Vec::new();
        for index in 0..self.backend.len() {
            let Some(key) = self.backend.key(index) else {
                continue;
            };
            if self.is_reserved(&key) {
                continue;
            }
            if let Some(stored) = self.read(&key) {
                if stored.expiry().is_expired_at(now) {
                    expired_keys.push(key);
                }
            }
        }

        for key in &expired_keys {
            self.remove(key);
            self.stats.record_expired();
        }
        expired_keys.len()
    }

    fn read(&self, key: &str) -> Option<StoredValue> {
        let raw = self.backend.get_item(key)?;
        match codec::deserialize(&raw) {
            Some(decoded) => Some(StoredValue::from_decoded(decoded)),
            None => {
                debug!(key, "Corrupted record treated as absent");
                None
            }
        }
    }

    fn is_reserved(&self, key: &str) -> bool {
        key == self.queue.key() || key == PROBE_KEY
    }
}

impl<B: Backend> fmt::Debug for CacheStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("queue", &self.queue)
            .field("stats", &self.stats)
            .field("max_retry", &self.max_retry)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Writes, reads back and removes the probe key.
fn probe<B: Backend>(backend: &mut B) -> bool {
    let Ok(encoded) = codec::encode_plain(PROBE_KEY) else {
        return false;
    };
    let round_trip = backend.set_item(PROBE_KEY, &encoded).is_ok()
        && backend
            .get_item(PROBE_KEY)
            .and_then(|raw| codec::deserialize(&raw))
            == Some(Value::String(PROBE_KEY.to_string()));
    let _ = backend.remove_item(PROBE_KEY);
    round_trip
}
