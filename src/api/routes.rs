//! API Routes
//!
//! Configures the Axum router: admin endpoints plus a proxy fallback.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, health_handler, invalidate_handler, proxy_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /_cache/stats` - Cache statistics
/// - `DELETE /_cache?prefix=/x` - Invalidate by key prefix
/// - `POST /_cache/clear` - End the caller's session cache (`?all=true`: every session)
/// - anything else - Proxied to the upstream backend
///
/// # Middleware
/// - CORS: Allows any origin (the front-end is served elsewhere)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([super::handlers::X_CACHE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/_cache", delete(invalidate_handler))
        .route("/_cache/stats", get(stats_handler))
        .route("/_cache/clear", post(clear_handler))
        .fallback(proxy_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
