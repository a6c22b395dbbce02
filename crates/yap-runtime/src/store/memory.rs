//! In-memory field store
//!
//! Memory-based storage for testing and development. Data is lost when the
//! process exits.

use super::FieldStore;
use crate::error::{Result, RuntimeError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use yap_core::{
    FieldDefinition, FieldValueRow, GroupMeta, GroupName, LayoutDefinition, LocationRule,
    TableDescriptor, Value,
};

#[derive(Default)]
struct GroupTables {
    patterns: Vec<FieldDefinition>,
    next_pattern_id: i64,
    values: Vec<FieldValueRow>,
    next_value_id: i64,
    /// (field_name, associated_id) -> ordered rows
    rows: HashMap<(String, i64), Vec<Value>>,
}

/// In-memory field store
pub struct MemoryStore {
    /// Map of data table name -> group tables
    tables: RwLock<HashMap<String, GroupTables>>,
    location_rules: RwLock<HashMap<GroupName, Vec<LocationRule>>>,
    group_meta: RwLock<HashMap<GroupName, GroupMeta>>,
    layouts: RwLock<HashMap<(GroupName, String), Vec<LayoutDefinition>>>,
    /// Simulates a driver outage: every call fails while set
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create a new memory store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            location_rules: RwLock::new(HashMap::new()),
            group_meta: RwLock::new(HashMap::new()),
            layouts: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with a storage error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RuntimeError::Storage("memory store unavailable".to_string()));
        }
        Ok(())
    }

    fn missing(tables: &TableDescriptor) -> RuntimeError {
        RuntimeError::TableMissing(tables.data_table.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FieldStore for MemoryStore {
    async fn table_exists(&self, tables: &TableDescriptor) -> Result<bool> {
        self.check_available()?;
        Ok(self.tables.read().await.contains_key(&tables.data_table))
    }

    async fn create_group_tables(&self, tables: &TableDescriptor) -> Result<()> {
        self.check_available()?;
        self.tables
            .write()
            .await
            .entry(tables.data_table.clone())
            .or_insert_with(|| GroupTables {
                next_pattern_id: 1,
                next_value_id: 1,
                ..Default::default()
            });
        Ok(())
    }

    async fn drop_group_tables(&self, tables: &TableDescriptor) -> Result<()> {
        self.check_available()?;
        self.tables.write().await.remove(&tables.data_table);
        Ok(())
    }

    async fn list_patterns(&self, tables: &TableDescriptor) -> Result<Vec<FieldDefinition>> {
        self.check_available()?;
        let all = self.tables.read().await;
        let group = all.get(&tables.data_table).ok_or_else(|| Self::missing(tables))?;
        Ok(group.patterns.clone())
    }

    async fn insert_pattern(
        &self,
        tables: &TableDescriptor,
        field: &FieldDefinition,
    ) -> Result<i64> {
        self.check_available()?;
        let mut all = self.tables.write().await;
        let group = all
            .get_mut(&tables.data_table)
            .ok_or_else(|| Self::missing(tables))?;

        if group
            .patterns
            .iter()
            .any(|p| p.generated_name == field.generated_name)
        {
            return Err(RuntimeError::Storage(format!(
                "duplicate generated_name '{}' in {}",
                field.generated_name, tables.pattern_table
            )));
        }

        let id = group.next_pattern_id;
        group.next_pattern_id += 1;

        let mut stored = field.clone();
        stored.id = Some(id);
        group.patterns.push(stored);
        Ok(id)
    }

    async fn update_pattern(
        &self,
        tables: &TableDescriptor,
        id: i64,
        field: &FieldDefinition,
    ) -> Result<()> {
        self.check_available()?;
        let mut all = self.tables.write().await;
        let group = all
            .get_mut(&tables.data_table)
            .ok_or_else(|| Self::missing(tables))?;

        let slot = group
            .patterns
            .iter_mut()
            .find(|p| p.id == Some(id))
            .ok_or_else(|| RuntimeError::FieldNotFound(format!("pattern id {}", id)))?;

        let mut stored = field.clone();
        stored.id = Some(id);
        *slot = stored;
        Ok(())
    }

    async fn find_value(
        &self,
        tables: &TableDescriptor,
        generated_name: &str,
        associated_id: i64,
    ) -> Result<Option<FieldValueRow>> {
        self.check_available()?;
        let all = self.tables.read().await;
        let group = all.get(&tables.data_table).ok_or_else(|| Self::missing(tables))?;
        Ok(group
            .values
            .iter()
            .find(|row| row.generated_name == generated_name && row.associated_id == associated_id)
            .cloned())
    }

    async fn find_value_by_label(
        &self,
        tables: &TableDescriptor,
        user_name: &str,
        associated_id: i64,
    ) -> Result<Option<FieldValueRow>> {
        self.check_available()?;
        let all = self.tables.read().await;
        let group = all.get(&tables.data_table).ok_or_else(|| Self::missing(tables))?;
        Ok(group
            .values
            .iter()
            .find(|row| row.user_name == user_name && row.associated_id == associated_id)
            .cloned())
    }

    async fn list_values(
        &self,
        tables: &TableDescriptor,
        associated_id: i64,
    ) -> Result<Vec<FieldValueRow>> {
        self.check_available()?;
        let all = self.tables.read().await;
        let group = all.get(&tables.data_table).ok_or_else(|| Self::missing(tables))?;
        Ok(group
            .values
            .iter()
            .filter(|row| row.associated_id == associated_id)
            .cloned()
            .collect())
    }

    async fn upsert_value(&self, tables: &TableDescriptor, row: &FieldValueRow) -> Result<()> {
        self.check_available()?;
        // The write lock spans lookup and write, so this is atomic
        let mut all = self.tables.write().await;
        let group = all
            .get_mut(&tables.data_table)
            .ok_or_else(|| Self::missing(tables))?;

        match group.values.iter_mut().find(|existing| {
            existing.generated_name == row.generated_name
                && existing.associated_id == row.associated_id
        }) {
            Some(existing) => {
                existing.user_name = row.user_name.clone();
                existing.field_type = row.field_type.clone();
                existing.field_value = row.field_value.clone();
            }
            None => {
                let mut stored = row.clone();
                stored.id = Some(group.next_value_id);
                group.next_value_id += 1;
                group.values.push(stored);
            }
        }
        Ok(())
    }

    async fn count_values(
        &self,
        tables: &TableDescriptor,
        generated_name: &str,
        associated_id: i64,
    ) -> Result<usize> {
        self.check_available()?;
        let all = self.tables.read().await;
        let group = all.get(&tables.data_table).ok_or_else(|| Self::missing(tables))?;
        Ok(group
            .values
            .iter()
            .filter(|row| row.generated_name == generated_name && row.associated_id == associated_id)
            .count())
    }

    async fn list_rows(
        &self,
        tables: &TableDescriptor,
        field_name: &str,
        associated_id: i64,
    ) -> Result<Vec<Value>> {
        self.check_available()?;
        let all = self.tables.read().await;
        let group = all.get(&tables.data_table).ok_or_else(|| Self::missing(tables))?;
        Ok(group
            .rows
            .get(&(field_name.to_string(), associated_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_rows(
        &self,
        tables: &TableDescriptor,
        field_name: &str,
        associated_id: i64,
        rows: &[Value],
    ) -> Result<()> {
        self.check_available()?;
        let mut all = self.tables.write().await;
        let group = all
            .get_mut(&tables.data_table)
            .ok_or_else(|| Self::missing(tables))?;
        group
            .rows
            .insert((field_name.to_string(), associated_id), rows.to_vec());
        Ok(())
    }

    async fn replace_location_rules(
        &self,
        group: &GroupName,
        rules: &[LocationRule],
    ) -> Result<()> {
        self.check_available()?;
        let mut sorted = rules.to_vec();
        sorted.sort_by_key(|rule| (rule.rule_group, rule.rule_order));
        self.location_rules.write().await.insert(group.clone(), sorted);
        Ok(())
    }

    async fn location_rules(&self, group: &GroupName) -> Result<Vec<LocationRule>> {
        self.check_available()?;
        Ok(self
            .location_rules
            .read()
            .await
            .get(group)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_group_meta(&self, meta: &GroupMeta) -> Result<()> {
        self.check_available()?;
        self.group_meta
            .write()
            .await
            .insert(meta.name.clone(), meta.clone());
        Ok(())
    }

    async fn group_meta(&self, group: &GroupName) -> Result<Option<GroupMeta>> {
        self.check_available()?;
        Ok(self.group_meta.read().await.get(group).cloned())
    }

    async fn list_group_meta(&self) -> Result<Vec<GroupMeta>> {
        self.check_available()?;
        let mut metas: Vec<GroupMeta> = self.group_meta.read().await.values().cloned().collect();
        metas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(metas)
    }

    async fn save_layouts(
        &self,
        group: &GroupName,
        field_name: &str,
        layouts: &[LayoutDefinition],
    ) -> Result<()> {
        self.check_available()?;
        self.layouts
            .write()
            .await
            .insert((group.clone(), field_name.to_string()), layouts.to_vec());
        Ok(())
    }

    async fn layouts(
        &self,
        group: &GroupName,
        field_name: &str,
    ) -> Result<Vec<LayoutDefinition>> {
        self.check_available()?;
        Ok(self
            .layouts
            .read()
            .await
            .get(&(group.clone(), field_name.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yap_core::FieldType;

    fn tables() -> TableDescriptor {
        GroupName::new("pricing").unwrap().tables()
    }

    #[tokio::test]
    async fn test_tables_must_exist() {
        let store = MemoryStore::new();
        let result = store.list_patterns(&tables()).await;
        assert!(matches!(result, Err(RuntimeError::TableMissing(_))));

        store.create_group_tables(&tables()).await.unwrap();
        assert!(store.table_exists(&tables()).await.unwrap());
        assert!(store.list_patterns(&tables()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row() {
        let store = MemoryStore::new();
        store.create_group_tables(&tables()).await.unwrap();

        let field = FieldDefinition::new("Base Price", FieldType::Number);
        let row = FieldValueRow::for_field(&field, &Value::Number(100.0), 42);
        store.upsert_value(&tables(), &row).await.unwrap();
        store.upsert_value(&tables(), &row).await.unwrap();

        let count = store
            .count_values(&tables(), "field_base_price", 42)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_pattern_rejected() {
        let store = MemoryStore::new();
        store.create_group_tables(&tables()).await.unwrap();

        let field = FieldDefinition::new("Title", FieldType::ShortText);
        assert_eq!(store.insert_pattern(&tables(), &field).await.unwrap(), 1);
        assert!(store.insert_pattern(&tables(), &field).await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.create_group_tables(&tables()).await.is_err());
    }
}
