//! Storage backends
//!
//! Every persistent table the engine touches is reached through the
//! [`FieldStore`] trait. Per-group tables are addressed with a
//! [`TableDescriptor`], never with a raw table name.

mod memory;
#[cfg(feature = "sqlx")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlx")]
pub use sqlite::SqliteStore;

use crate::error::Result;
use yap_core::{
    FieldDefinition, FieldValueRow, GroupMeta, GroupName, LayoutDefinition, LocationRule,
    TableDescriptor, Value,
};

/// Trait for field storage backends
#[async_trait::async_trait]
pub trait FieldStore: Send + Sync {
    /// Check whether the group's tables exist
    async fn table_exists(&self, tables: &TableDescriptor) -> Result<bool>;

    /// Create the group's tables if they are missing. Never migrates.
    async fn create_group_tables(&self, tables: &TableDescriptor) -> Result<()>;

    /// Drop the group's tables and everything stored in them
    async fn drop_group_tables(&self, tables: &TableDescriptor) -> Result<()>;

    /// All field definitions of a group, in insertion order
    async fn list_patterns(&self, tables: &TableDescriptor) -> Result<Vec<FieldDefinition>>;

    /// Insert a definition, returning its new id
    async fn insert_pattern(&self, tables: &TableDescriptor, field: &FieldDefinition)
        -> Result<i64>;

    /// Overwrite the definition stored under `id`
    async fn update_pattern(
        &self,
        tables: &TableDescriptor,
        id: i64,
        field: &FieldDefinition,
    ) -> Result<()>;

    /// Value row by machine key
    async fn find_value(
        &self,
        tables: &TableDescriptor,
        generated_name: &str,
        associated_id: i64,
    ) -> Result<Option<FieldValueRow>>;

    /// Value row by label
    async fn find_value_by_label(
        &self,
        tables: &TableDescriptor,
        user_name: &str,
        associated_id: i64,
    ) -> Result<Option<FieldValueRow>>;

    /// Every value row of a post
    async fn list_values(
        &self,
        tables: &TableDescriptor,
        associated_id: i64,
    ) -> Result<Vec<FieldValueRow>>;

    /// Insert or update the row of `(generated_name, associated_id)` atomically
    async fn upsert_value(&self, tables: &TableDescriptor, row: &FieldValueRow) -> Result<()>;

    /// Number of rows stored for `(generated_name, associated_id)`
    async fn count_values(
        &self,
        tables: &TableDescriptor,
        generated_name: &str,
        associated_id: i64,
    ) -> Result<usize>;

    /// Ordered child rows of a repeater / flexible content field
    async fn list_rows(
        &self,
        tables: &TableDescriptor,
        field_name: &str,
        associated_id: i64,
    ) -> Result<Vec<Value>>;

    /// Replace all child rows atomically, re-indexing from 0
    async fn replace_rows(
        &self,
        tables: &TableDescriptor,
        field_name: &str,
        associated_id: i64,
        rows: &[Value],
    ) -> Result<()>;

    /// Replace a group's location rules wholesale
    async fn replace_location_rules(&self, group: &GroupName, rules: &[LocationRule])
        -> Result<()>;

    /// A group's location rules, in (rule_group, rule_order) order
    async fn location_rules(&self, group: &GroupName) -> Result<Vec<LocationRule>>;

    async fn save_group_meta(&self, meta: &GroupMeta) -> Result<()>;

    async fn group_meta(&self, group: &GroupName) -> Result<Option<GroupMeta>>;

    async fn list_group_meta(&self) -> Result<Vec<GroupMeta>>;

    /// Replace the allowed layouts of a flexible content field
    async fn save_layouts(
        &self,
        group: &GroupName,
        field_name: &str,
        layouts: &[LayoutDefinition],
    ) -> Result<()>;

    async fn layouts(&self, group: &GroupName, field_name: &str)
        -> Result<Vec<LayoutDefinition>>;
}
