//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;

use crate::cache::{Expiry, QUEUE_KEY, PROBE_KEY};

/// Longest key the API accepts, in bytes.
pub const MAX_KEY_LENGTH: usize = 256;

/// Expiry as sent by clients: epoch milliseconds or an RFC 3339 timestamp.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExpireInput {
    Millis(i64),
    At(DateTime<FixedOffset>),
}

impl From<ExpireInput> for Expiry {
    fn from(input: ExpireInput) -> Self {
        match input {
            ExpireInput::Millis(ms) => Expiry::from(ms),
            ExpireInput::At(at) => Expiry::from(at),
        }
    }
}

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `expire`: Optional absolute expiry; omitted means never
/// - `force`: Evict old entries when the write does not fit (default: true)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub expire: Option<ExpireInput>,
    #[serde(default = "default_force")]
    pub force: bool,
}

fn default_force() -> bool {
    true
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        if self.key == QUEUE_KEY || self.key == PROBE_KEY {
            return Some(format!("Key '{}' is reserved", self.key));
        }
        None
    }
}
