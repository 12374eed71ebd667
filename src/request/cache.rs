//! Request Cache
//!
//! Caches responses keyed by request, on top of [`CacheStore`].
//!
//! Each response is stored as a bundle carrying its own logical expiry and
//! the identity of the data source it came from. A bundle whose identity no
//! longer matches is dropped on read, whatever its expiry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::key::{Params, DEFAULT_SKIPPED_PARAMS};
use super::policy::{CacheDescriptor, CachePolicy};
use crate::backend::Backend;
use crate::cache::{current_timestamp_ms, CacheStore};
use crate::error::Result;

/// Physical retention of responses cached for fallback: one week.
pub const FALLBACK_RETENTION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Computes a data-source fingerprint from a request.
pub type IdentityFn = Box<dyn Fn(&str, &Params) -> String + Send + Sync>;

// == Cached Response ==
/// What the request cache stores per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// The response payload
    pub data: Value,
    /// Logical expiry, Unix milliseconds
    pub expire: i64,
    /// Data-source fingerprint at write time
    #[serde(default)]
    pub identity: String,
}

// == Request Cache ==
pub struct RequestCache<B: Backend> {
    store: CacheStore<B>,
    skipped: Vec<String>,
    identity: Option<IdentityFn>,
}

impl<B: Backend> RequestCache<B> {
    pub fn new(store: CacheStore<B>) -> Self {
        Self {
            store,
            skipped: DEFAULT_SKIPPED_PARAMS.iter().map(|s| s.to_string()).collect(),
            identity: None,
        }
    }

    /// Sets the fingerprint function used to invalidate stale responses.
    pub fn with_identity<F>(mut self, identity: F) -> Self
    where
        F: Fn(&str, &Params) -> String + Send + Sync + 'static,
    {
        self.identity = Some(Box::new(identity));
        self
    }

    /// Replaces the list of parameters left out of cache keys.
    pub fn with_skipped_params<I, S>(mut self, skipped: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped = skipped.into_iter().map(Into::into).collect();
        self
    }

    pub fn store(&self) -> &CacheStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CacheStore<B> {
        &mut self.store
    }

    /// Derives key, identity and expiry for a request.
    pub fn describe(&self, url: &str, params: &Params, policy: &CachePolicy) -> Result<CacheDescriptor> {
        let identity = self
            .identity
            .as_ref()
            .map(|f| f(url, params))
            .unwrap_or_default();
        CacheDescriptor::describe(url, params, policy, &self.skipped, identity)
    }

    // == Set Cache ==
    /// Caches `data` as the response to `url` with `params`.
    ///
    /// Nothing is stored when the policy disables caching or `data` is empty.
    /// Returns whether the response was stored.
    pub fn set_cache(&mut self, url: &str, params: &Params, policy: &CachePolicy, data: Value) -> bool {
        let descriptor = match self.describe(url, params, policy) {
            Ok(descriptor) => descriptor,
            Err(error) => {
                warn!(url, %error, "Response not cached");
                return false;
            }
        };

        if !descriptor.use_store || is_empty_payload(&data) {
            return false;
        }

        let retention = if descriptor.fallback_to_cache {
            current_timestamp_ms() + FALLBACK_RETENTION_MS
        } else {
            descriptor.expire
        };
        let bundle = CachedResponse {
            data,
            expire: descriptor.expire,
            identity: descriptor.identity,
        };

        let stored = self.store.set(&descriptor.key, bundle, retention).is_some();
        debug!(key = %descriptor.key, stored, "Response cache write");
        stored
    }

    // == Get Cache ==
    /// Returns the cached response to `url` with `params`, if still valid.
    ///
    /// With `fallback` set the logical expiry is ignored, so a week-old
    /// response can stand in for a failed request.
    pub fn get_cache(
        &mut self,
        url: &str,
        params: &Params,
        policy: &CachePolicy,
        fallback: bool,
    ) -> Option<Value> {
        let descriptor = match self.describe(url, params, policy) {
            Ok(descriptor) => descriptor,
            Err(error) => {
                warn!(url, %error, "Response cache read skipped");
                return None;
            }
        };
        if !descriptor.use_store {
            return None;
        }

        let bundle: CachedResponse = self.store.get_as(&descriptor.key)?;
        if is_empty_payload(&bundle.data) {
            return None;
        }
        if bundle.identity != descriptor.identity {
            debug!(key = %descriptor.key, "Data source changed, dropping cached response");
            self.store.remove(&descriptor.key);
            return None;
        }
        if fallback || bundle.expire >= current_timestamp_ms() {
            return Some(bundle.data);
        }
        None
    }

    // == Remove Cache ==
    pub fn remove_cache(&mut self, url: &str, params: &Params) {
        let key = super::key::cache_key(url, params, &self.skipped);
        self.store.remove(&key);
    }

    // == Retired Entry Points ==
    #[deprecated(note = "use `set_cache` instead")]
    pub fn set_item(&mut self, _key: &str, _value: Value) -> ! {
        panic!("RequestCache::set_item is retired, use RequestCache::set_cache instead");
    }

    #[deprecated(note = "use `get_cache` instead")]
    pub fn get_item(&mut self, _key: &str) -> ! {
        panic!("RequestCache::get_item is retired, use RequestCache::get_cache instead");
    }
}

/// `null` and empty strings, arrays and objects are not worth caching.
fn is_empty_payload(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cache::Expiry;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn cache() -> RequestCache<MemoryBackend> {
        RequestCache::new(CacheStore::new(MemoryBackend::unbounded()))
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_set_and_get_cache() {
        let mut cache = cache();
        let policy = CachePolicy::max_age(std::time::Duration::from_secs(60));
        let p = params(&[("id", "7")]);

        assert!(cache.set_cache("/api/item", &p, &policy, json!({"name": "seven"})));
        assert_eq!(
            cache.get_cache("/api/item", &p, &policy, false),
            Some(json!({"name": "seven"}))
        );
        assert_eq!(cache.store().queue(), vec!["/api/item?id=7".to_string()]);
    }

    #[test]
    fn test_without_policy_nothing_is_cached() {
        let mut cache = cache();
        let policy = CachePolicy::default();

        assert!(!cache.set_cache("/api", &Params::new(), &policy, json!([1])));
        assert_eq!(cache.get_cache("/api", &Params::new(), &policy, false), None);
        assert_eq!(cache.store().queue_count(), 0);
    }

    #[test]
    fn test_empty_data_is_not_cached() {
        let mut cache = cache();
        let policy = CachePolicy::end_of_day();

        assert!(!cache.set_cache("/a", &Params::new(), &policy, Value::Null));
        assert!(!cache.set_cache("/a", &Params::new(), &policy, json!({})));
        assert!(!cache.set_cache("/a", &Params::new(), &policy, json!([])));
        assert!(cache.set_cache("/a", &Params::new(), &policy, json!(0)));
    }

    #[test]
    fn test_skipped_params_share_an_entry() {
        let mut cache = cache();
        let policy = CachePolicy::end_of_day();

        cache.set_cache("/r", &params(&[("q", "x"), ("_", "1")]), &policy, json!("hit"));
        let got = cache.get_cache("/r?_=2", &params(&[("q", "x"), ("token", "abc")]), &policy, false);
        assert_eq!(got, Some(json!("hit")));
    }

    #[test]
    fn test_identity_change_drops_entry() {
        let version = Arc::new(Mutex::new("v1".to_string()));
        let current = version.clone();
        let mut cache = cache().with_identity(move |_, _| current.lock().unwrap().clone());
        let policy = CachePolicy::end_of_day();

        cache.set_cache("/r", &Params::new(), &policy, json!([1, 2]));
        assert!(cache.get_cache("/r", &Params::new(), &policy, false).is_some());

        *version.lock().unwrap() = "v2".to_string();
        assert_eq!(cache.get_cache("/r", &Params::new(), &policy, false), None);
        assert!(cache.store().get_item("/r").is_none());
    }

    #[test]
    fn test_logically_expired_bundle_not_served() {
        let mut cache = cache();
        let bundle = CachedResponse {
            data: json!("stale"),
            expire: current_timestamp_ms() - 1_000,
            identity: String::new(),
        };
        cache
            .store_mut()
            .set("/r", bundle, Expiry::in_millis(60_000));

        let policy = CachePolicy::end_of_day();
        assert_eq!(cache.get_cache("/r", &Params::new(), &policy, false), None);
        assert_eq!(
            cache.get_cache("/r", &Params::new(), &policy, true),
            Some(json!("stale"))
        );
    }

    #[test]
    fn test_fallback_extends_physical_retention() {
        let mut cache = cache();
        let expire_at = current_timestamp_ms() - 1_000;
        let policy = CachePolicy::expire_at(expire_at).with_fallback();

        assert!(cache.set_cache("/r", &Params::new(), &policy, json!("old")));

        let raw = cache.store().get_item("/r").unwrap();
        let retained = raw["expire"].as_i64().unwrap();
        assert!(retained > current_timestamp_ms() + FALLBACK_RETENTION_MS - 60_000);
        assert_eq!(raw["value"]["expire"], json!(expire_at));

        assert_eq!(cache.get_cache("/r", &Params::new(), &policy, false), None);
        assert_eq!(
            cache.get_cache("/r", &Params::new(), &policy, true),
            Some(json!("old"))
        );
    }

    #[test]
    fn test_fallback_without_expiry_is_logged_not_raised() {
        let mut cache = cache();
        let policy = CachePolicy::default().with_fallback();

        assert!(!cache.set_cache("/r", &Params::new(), &policy, json!(1)));
        assert_eq!(cache.get_cache("/r", &Params::new(), &policy, true), None);
    }

    #[test]
    fn test_remove_cache() {
        let mut cache = cache();
        let policy = CachePolicy::end_of_day();
        let p = params(&[("b", "2"), ("a", "1")]);

        cache.set_cache("/r", &p, &policy, json!("x"));
        cache.remove_cache("/r?a=1", &params(&[("b", "2")]));

        assert_eq!(cache.get_cache("/r", &p, &policy, false), None);
        assert_eq!(cache.store().queue_count(), 0);
    }

    #[test]
    fn test_custom_skipped_params() {
        let mut cache = cache().with_skipped_params(["session"]);
        let policy = CachePolicy::end_of_day();

        cache.set_cache("/r", &params(&[("session", "1"), ("t", "5")]), &policy, json!("x"));
        assert_eq!(cache.store().queue(), vec!["/r?t=5".to_string()]);
    }

    #[test]
    #[should_panic(expected = "retired")]
    #[allow(deprecated)]
    fn test_retired_set_item_panics() {
        cache().set_item("k", json!(1));
    }

    #[test]
    #[should_panic(expected = "retired")]
    #[allow(deprecated)]
    fn test_retired_get_item_panics() {
        cache().get_item("k");
    }
}
