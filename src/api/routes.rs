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
    clear_handler, fetch_handler, health_handler, info_handler, list_handler, map_handler,
    remove_handler, store_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/store/:type/:id", put(store_handler))
        .route("/fetch/:type/:id", get(fetch_handler))
        .route("/list/:type", get(list_handler))
        .route("/map/:type", get(map_handler))
        .route("/remove/:type/:id", delete(remove_handler))
        .route("/clear/:type", delete(clear_handler))
        .route("/info", get(info_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
