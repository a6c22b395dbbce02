//! Router creation and configuration

use super::handlers::*;
use super::types::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use yap_sdk::FieldEngine;

/// Create REST API router
pub fn create_router(engine: Arc<FieldEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/health", get(health))
        .route("/v1/groups/import", post(import_group))
        .route("/v1/groups/:group/export", get(export_group))
        .route("/v1/groups/:group/posts/:post_id/fields", get(get_fields))
        .route(
            "/v1/groups/:group/posts/:post_id/fields/:name",
            get(get_field).put(update_field),
        )
        .route("/v1/posts/resolve", post(resolve_post))
        .route("/v1/cache/stats", get(cache_stats))
        .route("/v1/cache/flush", post(flush_cache))
        .route("/v1/sync", post(sync_directory))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
