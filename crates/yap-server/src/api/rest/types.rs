//! Request and response types

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use yap_sdk::{FieldEngine, FieldEntry, GroupValues, Value};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FieldEngine>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// All values of a post in one group
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldsResponse {
    pub group: String,
    pub post_id: i64,
    pub fields: Vec<FieldEntry>,
}

/// One formatted value
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldResponse {
    pub name: String,
    pub value: Value,
}

/// Body of `PUT .../fields/{name}`
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateFieldPayload {
    pub value: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateFieldResponse {
    /// False when the field is unknown or storage refused the write
    pub updated: bool,
}

/// Groups applicable to a post, with their values
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub post_id: i64,
    pub groups: Vec<GroupValues>,
}

/// Body of `POST /v1/cache/flush`; flushes everything without a group
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheFlushPayload {
    #[serde(default)]
    pub group: Option<String>,
}
