//! Expiry policy for cached requests.

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use super::key::{cache_key, Params};
use crate::error::{CacheError, Result};

// == Cache Policy ==
/// How long a request's response may be served from cache.
///
/// Expiry sources, highest priority first: `expire_at`, `max_age_ms` counted
/// from now, then the end of the current calendar day. With none of them the
/// request is not cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Absolute expiry, Unix milliseconds
    pub expire_at: Option<i64>,
    /// Lifetime from now in milliseconds
    pub max_age_ms: Option<i64>,
    /// Expire at 23:59:59.999 local time today
    pub until_end_of_day: bool,
    /// Keep the response physically for a week so it can be served when the
    /// live request fails
    pub fallback_to_cache: bool,
}

impl CachePolicy {
    pub fn expire_at(timestamp_ms: i64) -> Self {
        Self {
            expire_at: Some(timestamp_ms),
            ..Self::default()
        }
    }

    pub fn max_age(max_age: Duration) -> Self {
        Self {
            max_age_ms: Some(max_age.as_millis().min(i64::MAX as u128) as i64),
            ..Self::default()
        }
    }

    pub fn end_of_day() -> Self {
        Self {
            until_end_of_day: true,
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self) -> Self {
        self.fallback_to_cache = true;
        self
    }

    /// Whether any expiry source is set.
    pub fn is_cacheable(&self) -> bool {
        self.expire_at.is_some() || self.max_age_ms.is_some() || self.until_end_of_day
    }

    /// Absolute expiry in milliseconds as seen at `now`, if caching applies.
    pub fn resolve_expiry<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<i64> {
        if let Some(at) = self.expire_at {
            return Some(at);
        }
        if let Some(max_age) = self.max_age_ms {
            return Some(now.timestamp_millis().saturating_add(max_age));
        }
        if self.until_end_of_day {
            return Some(end_of_day_ms(now));
        }
        None
    }
}

/// Last millisecond of `now`'s calendar day, in `now`'s own time zone.
pub fn end_of_day_ms<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let end = now
        .date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .and_then(|naive| naive.and_local_timezone(now.timezone()).earliest());

    match end {
        Some(end) => end.timestamp_millis(),
        // The wall clock skips 23:59 today; fall back to the last full second we can reach
        None => {
            let remaining = 86_399 - i64::from(now.num_seconds_from_midnight());
            now.timestamp_millis() + remaining * 1000
        }
    }
}

// == Cache Descriptor ==
/// Everything the request cache derives from one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDescriptor {
    /// Engine key
    pub key: String,
    /// Whether the policy allows caching at all
    pub use_store: bool,
    /// Fingerprint of the data source at request time
    pub identity: String,
    /// Logical expiry, Unix milliseconds
    pub expire: i64,
    pub fallback_to_cache: bool,
}

impl CacheDescriptor {
    /// Describes a request at the current local time.
    pub fn describe(
        url: &str,
        params: &Params,
        policy: &CachePolicy,
        skipped: &[String],
        identity: String,
    ) -> Result<Self> {
        Self::describe_at(url, params, policy, skipped, identity, &Local::now())
    }

    pub fn describe_at<Tz: TimeZone>(
        url: &str,
        params: &Params,
        policy: &CachePolicy,
        skipped: &[String],
        identity: String,
        now: &DateTime<Tz>,
    ) -> Result<Self> {
        if policy.fallback_to_cache && !policy.is_cacheable() {
            return Err(CacheError::InvalidRequest(
                "fallback to cache requires an expiry (expire_at, max_age or end of day)"
                    .to_string(),
            ));
        }

        let expiry = policy.resolve_expiry(now);
        Ok(Self {
            key: cache_key(url, params, skipped),
            use_store: expiry.is_some(),
            identity,
            expire: expiry.unwrap_or_else(|| now.timestamp_millis()),
            fallback_to_cache: policy.fallback_to_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 10, h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_no_source_is_not_cacheable() {
        let policy = CachePolicy::default();
        assert!(!policy.is_cacheable());
        assert_eq!(policy.resolve_expiry(&at(12, 0)), None);
    }

    #[test]
    fn test_expire_at_wins() {
        let policy = CachePolicy {
            expire_at: Some(42),
            max_age_ms: Some(1000),
            until_end_of_day: true,
            fallback_to_cache: false,
        };
        assert_eq!(policy.resolve_expiry(&at(12, 0)), Some(42));
    }

    #[test]
    fn test_max_age_beats_end_of_day() {
        let now = at(12, 0);
        let policy = CachePolicy {
            max_age_ms: Some(60_000),
            until_end_of_day: true,
            ..CachePolicy::default()
        };
        assert_eq!(policy.resolve_expiry(&now), Some(now.timestamp_millis() + 60_000));
    }

    #[test]
    fn test_end_of_day() {
        let now = at(17, 11);
        let expected = at(23, 59).timestamp_millis() + 59_999;
        assert_eq!(end_of_day_ms(&now), expected);
        assert_eq!(CachePolicy::end_of_day().resolve_expiry(&now), Some(expected));
    }

    #[test]
    fn test_max_age_from_duration() {
        let policy = CachePolicy::max_age(Duration::from_secs(2));
        assert_eq!(policy.max_age_ms, Some(2000));
    }

    #[test]
    fn test_fallback_without_expiry_is_rejected() {
        let policy = CachePolicy::default().with_fallback();
        let result = CacheDescriptor::describe("/r", &Params::new(), &policy, &[], String::new());
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[test]
    fn test_describe_uncached_request() {
        let now = at(9, 30);
        let descriptor = CacheDescriptor::describe_at(
            "/r?b=1",
            &Params::new(),
            &CachePolicy::default(),
            &[],
            "v1".to_string(),
            &now,
        )
        .unwrap();

        assert_eq!(descriptor.key, "/r?b=1");
        assert!(!descriptor.use_store);
        assert_eq!(descriptor.expire, now.timestamp_millis());
        assert_eq!(descriptor.identity, "v1");
    }
}
