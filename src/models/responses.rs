//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::StoreStatus;

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted", key),
            key,
        }
    }
}

/// Response body for the queue endpoint (GET /queue)
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    /// Tracked keys, least recently used first
    pub keys: Vec<String>,
}

/// Response body for the status endpoint (GET /status)
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Keys tracked for eviction
    pub queue_count: usize,
    /// Whether the backend passed the start-up probe
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
    /// Keys resident in the backend
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<StoreStatus> for StatusResponse {
    fn from(status: StoreStatus) -> Self {
        Self {
            queue_count: status.queue_count,
            enabled: status.enabled,
            hits: status.stats.hits,
            misses: status.stats.misses,
            evictions: status.stats.evictions,
            expired: status.stats.expired,
            total_entries: status.stats.total_entries,
            hit_rate: status.stats.hit_rate(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
