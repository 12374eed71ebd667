//! Backend Module
//!
//! The flat, quota-limited key-value medium the cache persists onto.
//!
//! A backend offers no ordering, no eviction and no transactions. Writes
//! past its capacity fail with [`BackendError::QuotaExceeded`]; everything
//! else about recency and expiry is the cache engine's business.

mod file;
mod memory;

use thiserror::Error;

pub use file::FileBackend;
pub use memory::MemoryBackend;

// == Backend Error ==
/// Errors raised by a backend medium.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The write would push usage past the medium's fixed capacity
    #[error("quota exceeded: needed {needed} units, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// The persisted image could not be read or written
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted image is not a valid snapshot
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

// == Backend Trait ==
/// Flat string key-value storage with a fixed capacity.
///
/// Enumeration (`len` + `key`) follows the medium's own order, which callers
/// must not treat as a recency order.
pub trait Backend: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Returns the raw value stored under `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove_item(&mut self, key: &str) -> Result<(), BackendError>;

    /// Removes every key.
    fn clear(&mut self) -> Result<(), BackendError>;

    /// Number of resident keys.
    fn len(&self) -> usize;

    /// Key at enumeration position `index`.
    fn key(&self, index: usize) -> Option<String>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        (**self).set_item(key, value)
    }

    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), BackendError> {
        (**self).remove_item(key)
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        (**self).clear()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn key(&self, index: usize) -> Option<String> {
        (**self).key(index)
    }
}

// == Utility Functions ==
/// Size of a string in UTF-16 code units, the unit quotas are measured in.
pub fn storage_units(s: &str) -> usize {
    s.encode_utf16().count()
}
