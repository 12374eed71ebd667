//! Request Module
//!
//! Response caching keyed by URL and query parameters, built on the cache
//! engine: key derivation, expiry policy, data-source identity checks and
//! fallback reads.

mod cache;
mod key;
mod policy;

pub use cache::{CachedResponse, IdentityFn, RequestCache, FALLBACK_RETENTION_MS};
pub use key::{append_params, cache_key, strip_params, Params, DEFAULT_SKIPPED_PARAMS};
pub use policy::{end_of_day_ms, CacheDescriptor, CachePolicy};
