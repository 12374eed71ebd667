//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::backend::{Backend, FileBackend, MemoryBackend};
use crate::cache::{CacheStore, Expiry};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, QueueResponse, SetRequest, SetResponse,
    StatusResponse,
};

/// Engine shared by every handler behind one lock.
///
/// The engine itself is not synchronized, so every operation goes through
/// this lock; `get` takes the write side because it refreshes recency.
pub type SharedStore = Arc<RwLock<CacheStore<Box<dyn Backend>>>>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: SharedStore,
}

impl AppState {
    pub fn new(cache: CacheStore<Box<dyn Backend>>) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    /// Creates state around any backend with the default eviction budget.
    pub fn with_backend(backend: impl Backend + 'static) -> Self {
        Self::new(CacheStore::new(Box::new(backend)))
    }

    /// Creates state from configuration.
    ///
    /// Uses a file backend when `data_file` is set, memory otherwise.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend: Box<dyn Backend> = match &config.data_file {
            Some(path) => Box::new(FileBackend::open(path, config.capacity)?),
            None => Box::new(MemoryBackend::new(config.capacity)),
        };
        Ok(Self::new(CacheStore::from_config(backend, config)))
    }
}

/// Handler for PUT /set
///
/// Stores a value with optional expiry. Responds 503 when the value cannot
/// be made to fit.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let expire = req.expire.map(Expiry::from).unwrap_or_default();
    let mut cache = state.cache.write().await;
    cache
        .set_with_force(&req.key, req.value, expire, req.force)
        .ok_or_else(|| CacheError::CacheFull(format!("value for '{}' does not fit", req.key)))?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: a hit refreshes recency
    let mut cache = state.cache.write().await;
    let value = cache
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Idempotent: deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let mut cache = state.cache.write().await;
    cache.remove(&key);

    Json(DeleteResponse::new(key))
}

/// Handler for GET /all
///
/// Every resident record, decoded, the queue's own record included.
pub async fn all_handler(State(state): State<AppState>) -> Json<HashMap<String, Value>> {
    let cache = state.cache.read().await;
    Json(cache.get_all())
}

/// Handler for GET /queue
pub async fn queue_handler(State(state): State<AppState>) -> Json<QueueResponse> {
    let cache = state.cache.read().await;
    Json(QueueResponse { keys: cache.queue() })
}

/// Handler for GET /status
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let cache = state.cache.read().await;
    Json(StatusResponse::from(cache.status()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
