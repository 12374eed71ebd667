//! In-memory quota-limited backend.

use std::collections::HashMap;

use super::{storage_units, Backend, BackendError};

// == Memory Backend ==
/// Key-value medium held in memory with a fixed capacity.
///
/// Usage is the sum of the UTF-16 lengths of every key and value. Keys
/// enumerate in first-insertion order; overwriting a key keeps its position.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    /// Stored values
    items: HashMap<String, String>,
    /// Enumeration order
    order: Vec<String>,
    /// Units currently used
    used: usize,
    /// Maximum units allowed
    capacity: usize,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an empty backend holding at most `capacity` units.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
            used: 0,
            capacity,
        }
    }

    /// Creates a backend that never rejects a write.
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Rebuilds a backend from `(key, value)` pairs in enumeration order.
    ///
    /// Capacity is not enforced on load, so an image larger than `capacity`
    /// is kept and later writes fail until enough has been removed.
    pub fn from_pairs(capacity: usize, pairs: Vec<(String, String)>) -> Self {
        let mut backend = Self::new(capacity);
        for (key, value) in pairs {
            backend.insert_unchecked(key, value);
        }
        backend
    }

    // == Accessors ==
    /// Units currently used.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Maximum units allowed.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units left before writes start failing.
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.used)
    }

    /// Iterates `(key, value)` pairs in enumeration order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter_map(|key| self.items.get(key).map(|v| (key.as_str(), v.as_str())))
    }

    fn insert_unchecked(&mut self, key: String, value: String) {
        let added = storage_units(&key) + storage_units(&value);
        match self.items.get(&key) {
            Some(old) => {
                self.used -= storage_units(&key) + storage_units(old);
            }
            None => self.order.push(key.clone()),
        }
        self.used += added;
        self.items.insert(key, value);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Backend for MemoryBackend {
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        let needed = storage_units(key) + storage_units(value);
        let released = self
            .items
            .get(key)
            .map(|old| storage_units(key) + storage_units(old))
            .unwrap_or(0);

        let available = self.capacity.saturating_sub(self.used) + released;
        if needed > available {
            return Err(BackendError::QuotaExceeded { needed, available });
        }

        self.insert_unchecked(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn remove_item(&mut self, key: &str) -> Result<(), BackendError> {
        if let Some(old) = self.items.remove(key) {
            self.used -= storage_units(key) + storage_units(&old);
            self.order.retain(|k| k != key);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        self.items.clear();
        self.order.clear();
        self.used = 0;
        Ok(())
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.order.get(index).cloned()
    }
}
