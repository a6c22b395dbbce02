//! Schema registry
//!
//! Maps a group to its backing tables and makes sure they exist.

use crate::pattern::PatternStore;
use crate::store::FieldStore;
use std::sync::Arc;
use tracing::{debug, info, warn};
use yap_core::{FieldDefinition, GroupName};

/// Creates and inspects the per-group tables
pub struct SchemaRegistry {
    store: Arc<dyn FieldStore>,
    patterns: Arc<PatternStore>,
}

impl SchemaRegistry {
    pub fn new(store: Arc<dyn FieldStore>, patterns: Arc<PatternStore>) -> Self {
        Self { store, patterns }
    }

    /// Create the group's tables if absent, then upsert `fields`.
    ///
    /// Existing tables are left untouched, columns are never migrated.
    /// Returns `false` when the driver fails; the error is logged.
    pub async fn ensure_group_tables(&self, group: &GroupName, fields: &[FieldDefinition]) -> bool {
        let tables = group.tables();

        match self.store.table_exists(&tables).await {
            Ok(true) => debug!("Tables for group '{}' already exist", group),
            Ok(false) => {
                if let Err(e) = self.store.create_group_tables(&tables).await {
                    warn!("Failed to create tables for group '{}': {}", group, e);
                    return false;
                }
                info!(
                    "Created tables {}, {} and {}",
                    tables.pattern_table, tables.data_table, tables.rows_table
                );
            }
            Err(e) => {
                warn!("Failed to inspect tables for group '{}': {}", group, e);
                return false;
            }
        }

        let mut ok = true;
        for field in fields {
            if self.patterns.upsert_field(group, field).await.is_none() {
                ok = false;
            }
        }
        ok
    }

    /// Whether the group's tables exist. Driver errors read as `false`.
    pub async fn table_exists(&self, group: &GroupName) -> bool {
        match self.store.table_exists(&group.tables()).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Failed to inspect tables for group '{}': {}", group, e);
                false
            }
        }
    }

    /// Drop every table of the group. Explicit admin action only.
    pub async fn drop_group(&self, group: &GroupName) -> bool {
        match self.store.drop_group_tables(&group.tables()).await {
            Ok(()) => {
                info!("Dropped tables of group '{}'", group);
                true
            }
            Err(e) => {
                warn!("Failed to drop tables of group '{}': {}", group, e);
                false
            }
        }
    }
}
