//! Cache Module
//!
//! Provides a persistent LRU cache over quota-limited storage, with
//! integrity-checked records and expiration.

pub mod codec;
mod entry;
mod queue;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, Expiry, StoredValue, NO_EXPIRY};
pub use queue::{RecencyQueue, QUEUE_KEY};
pub use stats::CacheStats;
pub use store::{CacheStore, StoreStatus, DEFAULT_MAX_RETRY, PROBE_KEY};
