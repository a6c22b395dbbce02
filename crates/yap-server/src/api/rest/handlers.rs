//! API endpoint handlers

use super::extractors::JsonExtractor;
use super::types::*;
use crate::error::ServerError;
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;
use yap_sdk::{CacheStats, GroupDocument, ImportReport, PostContext};

/// Health check endpoint
pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Every formatted value of a post in the group
pub(super) async fn get_fields(
    State(state): State<AppState>,
    Path((group, post_id)): Path<(String, i64)>,
) -> Json<FieldsResponse> {
    let fields = state.engine.get_fields(&group, post_id).await;
    Json(FieldsResponse {
        group,
        post_id,
        fields,
    })
}

pub(super) async fn get_field(
    State(state): State<AppState>,
    Path((group, post_id, name)): Path<(String, i64, String)>,
) -> Result<Json<FieldResponse>, ServerError> {
    let value = state
        .engine
        .get_field(&group, &name, post_id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("{}.{} of post {}", group, name, post_id)))?;
    Ok(Json(FieldResponse { name, value }))
}

pub(super) async fn update_field(
    State(state): State<AppState>,
    Path((group, post_id, name)): Path<(String, i64, String)>,
    JsonExtractor(payload): JsonExtractor<UpdateFieldPayload>,
) -> Result<Json<UpdateFieldResponse>, ServerError> {
    let updated = state
        .engine
        .update_field(&group, &name, payload.value, post_id)
        .await?;
    Ok(Json(UpdateFieldResponse { updated }))
}

pub(super) async fn export_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Result<Json<GroupDocument>, ServerError> {
    Ok(Json(state.engine.export_group(&group).await?))
}

/// Import a group document. The raw body is parsed by the engine so a
/// malformed document reports the decode error.
pub(super) async fn import_group(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportReport>, ServerError> {
    let report = state.engine.import_group_json(&body).await?;
    info!(
        "Imported group '{}' ({} field(s), {:?})",
        report.group, report.fields_imported, report.status
    );
    Ok(Json(report))
}

/// Groups whose location rules hold for the post, with their values
pub(super) async fn resolve_post(
    State(state): State<AppState>,
    JsonExtractor(post): JsonExtractor<PostContext>,
) -> Json<ResolveResponse> {
    let groups = state.engine.get_fields_for_post(&post).await;
    Json(ResolveResponse {
        post_id: post.id,
        groups,
    })
}

pub(super) async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.engine.cache_stats().await)
}

pub(super) async fn flush_cache(
    State(state): State<AppState>,
    JsonExtractor(payload): JsonExtractor<CacheFlushPayload>,
) -> Json<serde_json::Value> {
    let flushed = state.engine.flush_cache(payload.group.as_deref()).await;
    Json(serde_json::json!({ "flushed": flushed }))
}

/// Import new and modified documents of the sync directory
pub(super) async fn sync_directory(
    State(state): State<AppState>,
) -> Result<Json<Vec<ImportReport>>, ServerError> {
    Ok(Json(state.engine.sync_from_directory().await?))
}
