//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

// == Cache Error Enum ==
/// Unified error type for the cache and its HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache (absent, expired or corrupted)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Write did not fit even after eviction
    #[error("Cache full: {0}")]
    CacheFull(String),

    /// Backend medium rejected an operation
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::CacheFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Backend(BackendError::QuotaExceeded { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
