//! Quota Cache - an LRU cache over quota-limited key/value storage
//!
//! Values are stored length-prefixed with an optional absolute expiry. A
//! recency queue persisted in the same storage decides what to evict when a
//! write exceeds the quota.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod request;
pub mod tasks;

pub use api::{create_router, AppState};
pub use backend::{Backend, BackendError, FileBackend, MemoryBackend};
pub use cache::{CacheStore, Expiry};
pub use config::Config;
pub use error::{CacheError, Result};
pub use request::{CachePolicy, RequestCache};
pub use tasks::spawn_sweep_task;
