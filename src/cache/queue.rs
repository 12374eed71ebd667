//! Recency Queue Module
//!
//! Tracks access order for LRU eviction, persisted through the backend.
//!
//! The queue lives under a reserved key as a single record: every key is
//! percent-escaped (which also escapes `|`), the escaped keys are joined with
//! `|`, and the joined string is written in the codec's length-prefixed form.
//!
//! Order:
//! - Front = Least recently used
//! - Back = Most recently used

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cache::codec;
use serde_json::Value;

/// Reserved backend key holding the queue.
pub const QUEUE_KEY: &str = "__queue__";

const QUEUE_DELIMITER: char = '|';

// == Recency Queue ==
/// Persisted LRU order of the keys the engine tracks for eviction.
///
/// The queue holds no state of its own; every operation reads and writes the
/// backend record, so it stays correct across engine restarts.
#[derive(Debug, Clone)]
pub struct RecencyQueue {
    /// Backend key the queue is stored under
    key: String,
}

impl RecencyQueue {
    // == Constructor ==
    pub fn new() -> Self {
        Self::with_key(QUEUE_KEY)
    }

    /// Creates a queue stored under a custom key.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Backend key the queue is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    // == Load ==
    /// Reads the queue, oldest first.
    ///
    /// A missing, empty or corrupted record reads as an empty queue.
    pub fn load<B: Backend + ?Sized>(&self, backend: &B) -> Vec<String> {
        let Some(raw) = backend.get_item(&self.key) else {
            return Vec::new();
        };

        match codec::deserialize(&raw) {
            Some(Value::String(joined)) if joined.is_empty() => Vec::new(),
            Some(Value::String(joined)) => joined.split(QUEUE_DELIMITER).map(unescape).collect(),
            _ => {
                debug!(key = %self.key, "Queue record unreadable, starting empty");
                Vec::new()
            }
        }
    }

    // == Save ==
    /// Persists `keys` as the whole queue.
    ///
    /// Best-effort: a failed write is logged and dropped.
    pub fn save<B: Backend + ?Sized>(&self, backend: &mut B, keys: &[String]) {
        let joined = keys
            .iter()
            .map(|k| urlencoding::encode(k).into_owned())
            .collect::<Vec<_>>()
            .join(&QUEUE_DELIMITER.to_string());

        let result = codec::serialize(&joined)
            .map_err(|e| e.to_string())
            .and_then(|wire| {
                backend
                    .set_item(&self.key, &wire)
                    .map_err(|e| e.to_string())
            });

        if let Err(error) = result {
            warn!(key = %self.key, len = keys.len(), %error, "Failed to persist recency queue");
        }
    }

    // == Touch ==
    /// Marks a key as most recently used (moves to back).
    ///
    /// Every existing occurrence is dropped before the key is appended once.
    pub fn touch<B: Backend + ?Sized>(&self, backend: &mut B, key: &str) {
        let mut keys = self.load(backend);
        keys.retain(|k| k != key);
        keys.push(key.to_string());
        self.save(backend, &keys);
    }

    // == Shift ==
    /// Removes and returns the least recently used key.
    ///
    /// Returns None if the queue is empty.
    pub fn shift<B: Backend + ?Sized>(&self, backend: &mut B) -> Option<String> {
        let mut keys = self.load(backend);
        if keys.is_empty() {
            return None;
        }
        let oldest = keys.remove(0);
        self.save(backend, &keys);
        Some(oldest)
    }

    // == Remove ==
    /// Removes every occurrence of a key.
    pub fn remove<B: Backend + ?Sized>(&self, backend: &mut B, key: &str) {
        let mut keys = self.load(backend);
        keys.retain(|k| k != key);
        self.save(backend, &keys);
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len<B: Backend + ?Sized>(&self, backend: &B) -> usize {
        self.load(backend).len()
    }

    pub fn is_empty<B: Backend + ?Sized>(&self, backend: &B) -> bool {
        self.len(backend) == 0
    }

    /// Checks if a key is being tracked.
    pub fn contains<B: Backend + ?Sized>(&self, backend: &B, key: &str) -> bool {
        self.load(backend).iter().any(|k| k == key)
    }
}

impl Default for RecencyQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn unescape(part: &str) -> String {
    urlencoding::decode(part)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| part.to_string())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_queue_empty() {
        let backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::new();

        assert!(queue.load(&backend).is_empty());
        assert_eq!(queue.len(&backend), 0);
    }

    #[test]
    fn test_queue_touch_new_keys() {
        let mut backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::new();

        queue.touch(&mut backend, "key1");
        queue.touch(&mut backend, "key2");
        queue.touch(&mut backend, "key3");

        assert_eq!(queue.load(&backend), keys(&["key1", "key2", "key3"]));
    }

    #[test]
    fn test_queue_touch_existing_key_moves_to_back() {
        let mut backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::new();

        queue.touch(&mut backend, "a");
        queue.touch(&mut backend, "b");
        queue.touch(&mut backend, "c");
        queue.touch(&mut backend, "a");

        assert_eq!(queue.load(&backend), keys(&["b", "c", "a"]));
    }

    #[test]
    fn test_queue_touch_collapses_duplicates() {
        let mut backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::new();
        queue.save(&mut backend, &keys(&["x", "y", "x", "x"]));

        queue.touch(&mut backend, "x");
        assert_eq!(queue.load(&backend), keys(&["y", "x"]));
    }

    #[test]
    fn test_queue_shift_oldest() {
        let mut backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::new();

        queue.touch(&mut backend, "key1");
        queue.touch(&mut backend, "key2");

        assert_eq!(queue.shift(&mut backend), Some("key1".to_string()));
        assert_eq!(queue.load(&backend), keys(&["key2"]));
        assert_eq!(queue.shift(&mut backend), Some("key2".to_string()));
        assert_eq!(queue.shift(&mut backend), None);
    }

    #[test]
    fn test_queue_remove_all_occurrences() {
        let mut backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::new();
        queue.save(&mut backend, &keys(&["a", "b", "a", "c"]));

        queue.remove(&mut backend, "a");
        queue.remove(&mut backend, "nonexistent");

        assert_eq!(queue.load(&backend), keys(&["b", "c"]));
        assert!(!queue.contains(&backend, "a"));
    }

    #[test]
    fn test_queue_keys_with_delimiter_and_unicode() {
        let mut backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::new();
        let tricky = keys(&["a|b", "100%", "/api?x=1&y=2", "键 名", ""]);

        queue.save(&mut backend, &tricky);
        assert_eq!(queue.load(&backend), tricky);
    }

    #[test]
    fn test_queue_numeric_key_is_not_mistaken_for_prefix() {
        let mut backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::new();

        queue.touch(&mut backend, "12");
        queue.touch(&mut backend, "abc");
        assert_eq!(queue.load(&backend), keys(&["12", "abc"]));
    }

    #[test]
    fn test_queue_record_uses_length_prefixed_form() {
        let mut backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::new();

        queue.touch(&mut backend, "k1");
        queue.touch(&mut backend, "k|2");

        let raw = backend.get_item(QUEUE_KEY).unwrap();
        assert_eq!(raw, "10|\"k1|k%7C2\"");
    }

    #[test]
    fn test_queue_corrupted_record_reads_empty() {
        let mut backend = MemoryBackend::unbounded();
        backend.set_item(QUEUE_KEY, "99|\"a|b\"").unwrap();

        let queue = RecencyQueue::new();
        assert!(queue.load(&backend).is_empty());
    }

    #[test]
    fn test_queue_save_failure_is_swallowed() {
        let mut backend = MemoryBackend::new(12);
        let queue = RecencyQueue::new();

        // Record would be far larger than the quota
        queue.touch(&mut backend, "a_long_key_name");
        assert!(queue.load(&backend).is_empty());
        assert!(backend.get_item(QUEUE_KEY).is_none());
    }

    #[test]
    fn test_queue_custom_key() {
        let mut backend = MemoryBackend::unbounded();
        let queue = RecencyQueue::with_key("__order__");

        queue.touch(&mut backend, "a");
        assert!(backend.get_item("__order__").is_some());
        assert!(backend.get_item(QUEUE_KEY).is_none());
    }
}
