//! Cache Entry Module
//!
//! Defines the persisted entry shape and its expiration metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire value meaning "never expires".
pub const NO_EXPIRY: i64 = -1;

// == Expiry ==
/// Absolute expiration time of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Expiry {
    /// Entry lives until removed or evicted
    #[default]
    Never,
    /// Unix timestamp in milliseconds
    At(i64),
}

impl Expiry {
    /// Expires `ms` milliseconds from now.
    pub fn in_millis(ms: i64) -> Self {
        Expiry::At(current_timestamp_ms().saturating_add(ms))
    }

    /// Returns the absolute timestamp, if any.
    pub fn timestamp_ms(&self) -> Option<i64> {
        match self {
            Expiry::Never => None,
            Expiry::At(ts) => Some(*ts),
        }
    }

    // == Is Expired ==
    /// Checks whether the expiry has passed at `now`.
    ///
    /// An entry expiring exactly at `now` is still live.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(ts) => *ts < now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }
}

impl From<i64> for Expiry {
    fn from(ts: i64) -> Self {
        if ts > 0 {
            Expiry::At(ts)
        } else {
            Expiry::Never
        }
    }
}

impl From<Expiry> for i64 {
    fn from(expiry: Expiry) -> Self {
        expiry.timestamp_ms().unwrap_or(NO_EXPIRY)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Expiry {
    fn from(at: DateTime<Tz>) -> Self {
        Expiry::from(at.timestamp_millis())
    }
}

impl From<SystemTime> for Expiry {
    fn from(at: SystemTime) -> Self {
        Expiry::from(DateTime::<Utc>::from(at))
    }
}

impl<T: Into<Expiry>> From<Option<T>> for Expiry {
    fn from(expire: Option<T>) -> Self {
        expire.map(Into::into).unwrap_or(Expiry::Never)
    }
}

// == Cache Entry ==
/// A tracked value with its expiration, as written by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T = Value> {
    /// The stored value
    pub value: T,
    /// When the entry stops being served
    pub expire: Expiry,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, expire: Expiry) -> Self {
        Self { value, expire }
    }

    pub fn is_expired(&self) -> bool {
        self.expire.is_expired()
    }
}

// == Stored Value ==
/// What a decoded record turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    /// A `{value, expire}` record written by `set`
    Entry(CacheEntry),
    /// A value written without the expiry wrapper
    Bare(Value),
}

impl StoredValue {
    /// Classifies a decoded JSON value.
    ///
    /// Any object carrying a `value` field is an entry; a missing or
    /// non-numeric `expire` means it never expires.
    pub fn from_decoded(decoded: Value) -> Self {
        match decoded {
            Value::Object(mut map) if map.contains_key("value") => {
                let expire = map
                    .get("expire")
                    .and_then(|e| e.as_i64().or_else(|| e.as_f64().map(|f| f as i64)))
                    .map(Expiry::from)
                    .unwrap_or(Expiry::Never);
                let value = map.remove("value").unwrap_or(Value::Null);
                StoredValue::Entry(CacheEntry::new(value, expire))
            }
            other => StoredValue::Bare(other),
        }
    }

    /// Expiry of the record; bare values never expire.
    pub fn expiry(&self) -> Expiry {
        match self {
            StoredValue::Entry(entry) => entry.expire,
            StoredValue::Bare(_) => Expiry::Never,
        }
    }

    /// The payload callers asked to store.
    pub fn into_value(self) -> Value {
        match self {
            StoredValue::Entry(entry) => entry.value,
            StoredValue::Bare(value) => value,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
