//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    all_handler, delete_handler, get_handler, health_handler, queue_handler, set_handler,
    status_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a value, evicting old entries if needed
/// - `GET /get/:key` - Retrieve a live value and refresh its recency
/// - `DELETE /del/:key` - Delete a key
/// - `GET /all` - Dump every resident record
/// - `GET /queue` - Recency queue, least recently used first
/// - `GET /status` - Probe result and statistics
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/all", get(all_handler))
        .route("/queue", get(queue_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
