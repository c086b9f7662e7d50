//! API Routes
//!
//! Configures the Axum router with all image cache endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    health_handler, image_handler, prefetch_handler, stats_handler, warmup_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /prefetch` - Warm the cache from a document payload
/// - `GET /image?url=` - Fetch one (transformed) image
/// - `GET /warmup` - Pre-connect to configured upstream hosts
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/prefetch", post(prefetch_handler))
        .route("/image", get(image_handler))
        .route("/warmup", get(warmup_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
