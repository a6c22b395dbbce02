//! Field value store
//!
//! One row per (field, post) in the group's data table. Repeater and
//! flexible content fields keep their rows in the child table and a
//! summary row (the row count) in the data table.

use crate::error::{Result, RuntimeError};
use crate::pattern::PatternStore;
use crate::store::FieldStore;
use std::sync::Arc;
use tracing::{debug, warn};
use yap_core::{FieldDefinition, FieldEntry, FieldType, FieldValueRow, GroupName, Value};

/// Resolves attachment ids to URLs for image/file fields returning URLs
#[async_trait::async_trait]
pub trait AttachmentResolver: Send + Sync {
    async fn url_for(&self, attachment_id: i64) -> Option<String>;
}

/// Attachment URLs derived from a fixed uploads base URL
pub struct UploadsUrlResolver {
    base_url: String,
}

impl UploadsUrlResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl AttachmentResolver for UploadsUrlResolver {
    async fn url_for(&self, attachment_id: i64) -> Option<String> {
        Some(format!("{}/{}", self.base_url, attachment_id))
    }
}

/// Field value store
pub struct ValueStore {
    store: Arc<dyn FieldStore>,
    patterns: Arc<PatternStore>,
    attachments: Option<Arc<dyn AttachmentResolver>>,
}

impl ValueStore {
    pub fn new(store: Arc<dyn FieldStore>, patterns: Arc<PatternStore>) -> Self {
        Self {
            store,
            patterns,
            attachments: None,
        }
    }

    /// Set the attachment collaborator used for URL-returning image fields
    pub fn with_attachments(mut self, resolver: Arc<dyn AttachmentResolver>) -> Self {
        self.attachments = Some(resolver);
        self
    }

    /// Read a value by label or machine key. Missing table, field or row
    /// read as `None`.
    pub async fn get_value(&self, field_name: &str, post_id: i64, group: &GroupName) -> Option<Value> {
        if let Some(field) = self.patterns.find_field(group, field_name).await {
            return self.get_for_definition(&field, post_id, group).await;
        }

        // No pattern row: fall back to the denormalised copies in the data table
        let tables = group.tables();
        let row = match self.store.find_value_by_label(&tables, field_name, post_id).await {
            Ok(Some(row)) => Some(row),
            Ok(None) => self
                .store
                .find_value(&tables, field_name, post_id)
                .await
                .unwrap_or_else(|e| log_read_error(group, field_name, e)),
            Err(e) => log_read_error(group, field_name, e),
        };
        row.map(|row| row.decoded())
    }

    /// Read the value of a known definition
    pub async fn get_for_definition(
        &self,
        field: &FieldDefinition,
        post_id: i64,
        group: &GroupName,
    ) -> Option<Value> {
        let tables = group.tables();

        if field.field_type.has_rows() {
            return match self.store.list_rows(&tables, &field.generated_name, post_id).await {
                Ok(rows) if rows.is_empty() => self.summary_exists(field, post_id, group).await,
                Ok(rows) => Some(Value::Array(rows)),
                Err(e) => log_read_error(group, &field.generated_name, e),
            };
        }

        let row = match self.store.find_value(&tables, &field.generated_name, post_id).await {
            Ok(row) => row?,
            Err(e) => return log_read_error(group, &field.generated_name, e),
        };

        let value = row.decoded();
        if field.field_type == FieldType::Image && field.return_url() {
            return Some(self.resolve_url(value).await);
        }
        Some(value)
    }

    /// An emptied repeater still reads as an empty row set
    async fn summary_exists(
        &self,
        field: &FieldDefinition,
        post_id: i64,
        group: &GroupName,
    ) -> Option<Value> {
        match self
            .store
            .find_value(&group.tables(), &field.generated_name, post_id)
            .await
        {
            Ok(Some(_)) => Some(Value::Array(Vec::new())),
            Ok(None) => None,
            Err(e) => log_read_error(group, &field.generated_name, e),
        }
    }

    async fn resolve_url(&self, value: Value) -> Value {
        let (Some(resolver), Some(id)) = (&self.attachments, value.as_f64()) else {
            return value;
        };
        match resolver.url_for(id as i64).await {
            Some(url) => Value::String(url),
            None => value,
        }
    }

    /// Every stored value of a post in the group
    pub async fn get_all_values(&self, post_id: i64, group: &GroupName) -> Vec<FieldEntry> {
        let tables = group.tables();
        let rows = match self.store.list_values(&tables, post_id).await {
            Ok(rows) => rows,
            Err(RuntimeError::TableMissing(_)) => return Vec::new(),
            Err(e) => {
                warn!("Failed to load values of post {} in group '{}': {}", post_id, group, e);
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let value = if row.field_type.has_rows() {
                match self.store.list_rows(&tables, &row.generated_name, post_id).await {
                    Ok(items) => Value::Array(items),
                    Err(e) => {
                        warn!("Failed to load rows of '{}': {}", row.generated_name, e);
                        Value::Array(Vec::new())
                    }
                }
            } else {
                row.decoded()
            };

            entries.push(FieldEntry {
                label: row.user_name,
                name: row.generated_name,
                value,
                field_type: row.field_type,
            });
        }
        entries
    }

    /// Write a value by label or machine key.
    ///
    /// Returns `false` when the field is unknown or the driver fails.
    pub async fn set_value(
        &self,
        field_name: &str,
        value: &Value,
        post_id: i64,
        group: &GroupName,
    ) -> bool {
        let Some(field) = self.patterns.find_field(group, field_name).await else {
            debug!("Field '{}' not found in group '{}'", field_name, group);
            return false;
        };

        match self.set_for_definition(&field, value, post_id, group).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write '{}' for post {}: {}", field.generated_name, post_id, e);
                false
            }
        }
    }

    /// Persist a value for a known definition with an atomic upsert
    pub async fn set_for_definition(
        &self,
        field: &FieldDefinition,
        value: &Value,
        post_id: i64,
        group: &GroupName,
    ) -> Result<()> {
        let tables = group.tables();

        if field.field_type.has_rows() {
            let rows = match value {
                Value::Array(rows) => rows.clone(),
                Value::Null => Vec::new(),
                other => {
                    return Err(RuntimeError::InvalidOperation(format!(
                        "'{}' expects a list of rows, got {}",
                        field.generated_name,
                        other.type_name()
                    )))
                }
            };
            self.store
                .replace_rows(&tables, &field.generated_name, post_id, &rows)
                .await?;
            let summary = FieldValueRow::for_field(field, &Value::Number(rows.len() as f64), post_id);
            return self.store.upsert_value(&tables, &summary).await;
        }

        let row = FieldValueRow::for_field(field, value, post_id);
        self.store.upsert_value(&tables, &row).await
    }

    /// Gather the values of every group referenced by a nested group field.
    ///
    /// References to groups without tables yield nothing.
    pub async fn get_nested_group(
        &self,
        field_name: &str,
        post_id: i64,
        group: &GroupName,
    ) -> Vec<FieldEntry> {
        let Some(field) = self.patterns.find_field(group, field_name).await else {
            return Vec::new();
        };

        let mut entries = Vec::new();
        for reference in field.nested_group_ids() {
            match GroupName::new(&reference) {
                Ok(nested) => entries.extend(self.get_all_values(post_id, &nested).await),
                Err(e) => debug!("Skipping nested reference '{}': {}", reference, e),
            }
        }
        entries
    }

    /// Number of data rows for (field, post); used to check upsert idempotence
    pub async fn count_values(&self, generated_name: &str, post_id: i64, group: &GroupName) -> usize {
        self.store
            .count_values(&group.tables(), generated_name, post_id)
            .await
            .unwrap_or(0)
    }
}

fn log_read_error<T>(group: &GroupName, field_name: &str, err: RuntimeError) -> Option<T> {
    match err {
        RuntimeError::TableMissing(_) => {}
        other => warn!("Failed to read '{}' in group '{}': {}", field_name, group, other),
    }
    None
}
