//! Repeater rows
//!
//! Rows are kept in the group's child table, ordered by a contiguous
//! index starting at 0. Every mutation holds the field's lock for the
//! whole read-change-write sequence.

use super::locks::KeyedLocks;
use crate::error::{Result, RuntimeError};
use crate::pattern::PatternStore;
use crate::store::FieldStore;
use crate::values::ValueStore;
use std::sync::Arc;
use tracing::debug;
use yap_core::{FieldDefinition, GroupName, Value};

/// Outcome of one row mutation with the rows on either side of it, both
/// read under the field's lock
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange<T = ()> {
    pub outcome: T,
    pub before: Vec<Value>,
    pub after: Vec<Value>,
}

pub struct RepeaterService {
    store: Arc<dyn FieldStore>,
    patterns: Arc<PatternStore>,
    values: Arc<ValueStore>,
    locks: Arc<KeyedLocks>,
}

impl RepeaterService {
    pub fn new(
        store: Arc<dyn FieldStore>,
        patterns: Arc<PatternStore>,
        values: Arc<ValueStore>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            store,
            patterns,
            values,
            locks,
        }
    }

    /// Resolve a field that stores rows
    pub(crate) async fn row_field(&self, group: &GroupName, field_name: &str) -> Result<FieldDefinition> {
        let field = self
            .patterns
            .find_field(group, field_name)
            .await
            .ok_or_else(|| RuntimeError::FieldNotFound(format!("{}.{}", group, field_name)))?;

        if !field.field_type.has_rows() {
            return Err(RuntimeError::InvalidOperation(format!(
                "'{}' is a {} field, not a repeater",
                field.generated_name, field.field_type
            )));
        }
        Ok(field)
    }

    /// Ordered rows; empty when nothing is stored
    pub async fn rows(&self, group: &GroupName, field_name: &str, post_id: i64) -> Result<Vec<Value>> {
        let field = self.row_field(group, field_name).await?;
        self.load(group, &field, post_id).await
    }

    async fn load(&self, group: &GroupName, field: &FieldDefinition, post_id: i64) -> Result<Vec<Value>> {
        match self
            .store
            .list_rows(&group.tables(), &field.generated_name, post_id)
            .await
        {
            Ok(rows) => Ok(rows),
            Err(RuntimeError::TableMissing(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Apply `change` to the current rows under the field's lock and
    /// persist the result
    async fn mutate<T>(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        change: impl FnOnce(&FieldDefinition, &mut Vec<Value>) -> Result<T>,
    ) -> Result<RowChange<T>> {
        let field = self.row_field(group, field_name).await?;
        let _guard = self
            .locks
            .lock(&KeyedLocks::key(group.as_str(), &field.generated_name, post_id))
            .await;

        let before = self.load(group, &field, post_id).await?;
        let mut rows = before.clone();
        let outcome = change(&field, &mut rows)?;
        self.values
            .set_for_definition(&field, &Value::Array(rows.clone()), post_id, group)
            .await?;
        Ok(RowChange {
            outcome,
            before,
            after: rows,
        })
    }

    /// Append a row, returning its index
    pub async fn add_row(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        row: Value,
    ) -> Result<RowChange<usize>> {
        self.mutate(group, field_name, post_id, |field, rows| {
            if let Some(max) = field.repeater_max {
                if rows.len() >= max as usize {
                    return Err(RuntimeError::InvalidOperation(format!(
                        "'{}' allows at most {} rows",
                        field.generated_name, max
                    )));
                }
            }
            rows.push(row);
            debug!("Added row {} to '{}' of post {}", rows.len() - 1, field.generated_name, post_id);
            Ok(rows.len() - 1)
        })
        .await
    }

    /// Replace the row at `index`
    pub async fn update_row(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        index: usize,
        row: Value,
    ) -> Result<RowChange> {
        self.mutate(group, field_name, post_id, |field, rows| {
            let slot = rows
                .get_mut(index)
                .ok_or_else(|| out_of_range(field, index))?;
            *slot = row;
            Ok(())
        })
        .await
    }

    /// Remove the row at `index`, returning it; later rows shift down by one
    pub async fn delete_row(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        index: usize,
    ) -> Result<RowChange<Value>> {
        self.mutate(group, field_name, post_id, |field, rows| {
            if index >= rows.len() {
                return Err(out_of_range(field, index));
            }
            Ok(rows.remove(index))
        })
        .await
    }

    /// Move the row at `from` to position `to`
    pub async fn move_row(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        from: usize,
        to: usize,
    ) -> Result<RowChange> {
        self.mutate(group, field_name, post_id, |field, rows| {
            if from >= rows.len() {
                return Err(out_of_range(field, from));
            }
            if to >= rows.len() {
                return Err(out_of_range(field, to));
            }
            let row = rows.remove(from);
            rows.insert(to, row);
            Ok(())
        })
        .await
    }

    /// Overwrite every row
    pub async fn replace_rows(
        &self,
        group: &GroupName,
        field_name: &str,
        post_id: i64,
        new_rows: Vec<Value>,
    ) -> Result<RowChange> {
        self.mutate(group, field_name, post_id, |_, rows| {
            *rows = new_rows;
            Ok(())
        })
        .await
    }
}

fn out_of_range(field: &FieldDefinition, index: usize) -> RuntimeError {
    RuntimeError::InvalidOperation(format!(
        "row {} of '{}' does not exist",
        index, field.generated_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashMap;
    use yap_core::FieldType;

    async fn setup(field: FieldDefinition) -> (RepeaterService, GroupName) {
        let store = Arc::new(MemoryStore::new());
        let group = GroupName::new("team").unwrap();
        store.create_group_tables(&group.tables()).await.unwrap();
        let patterns = Arc::new(PatternStore::new(store.clone()));
        patterns.upsert_field(&group, &field).await.unwrap();
        let values = Arc::new(ValueStore::new(store.clone(), patterns.clone()));
        let service = RepeaterService::new(store, patterns, values, Arc::new(KeyedLocks::new()));
        (service, group)
    }

    fn member(name: &str) -> Value {
        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::from(name));
        Value::Object(map)
    }

    #[tokio::test]
    async fn test_add_then_delete_leaves_empty() {
        let (service, group) = setup(FieldDefinition::new("Members", FieldType::Repeater)).await;

        let added = service.add_row(&group, "Members", 1, member("Ada")).await.unwrap();
        assert_eq!(added.outcome, 0);
        assert!(added.before.is_empty());
        let deleted = service.delete_row(&group, "Members", 1, 0).await.unwrap();
        assert_eq!(deleted.outcome, member("Ada"));
        assert_eq!(deleted.before, vec![member("Ada")]);
        assert!(deleted.after.is_empty());
        assert!(service.rows(&group, "Members", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_repacks_indices() {
        let (service, group) = setup(FieldDefinition::new("Members", FieldType::Repeater)).await;
        for name in ["Ada", "Grace", "Linus"] {
            service.add_row(&group, "Members", 1, member(name)).await.unwrap();
        }

        service.delete_row(&group, "Members", 1, 1).await.unwrap();
        let rows = service.rows(&group, "Members", 1).await.unwrap();
        assert_eq!(rows, vec![member("Ada"), member("Linus")]);

        service.update_row(&group, "Members", 1, 1, member("Ken")).await.unwrap();
        let rows = service.rows(&group, "Members", 1).await.unwrap();
        assert_eq!(rows[1], member("Ken"));
    }

    #[tokio::test]
    async fn test_out_of_range_and_max() {
        let field = FieldDefinition::new("Members", FieldType::Repeater).with_repeater_bounds(None, Some(1));
        let (service, group) = setup(field).await;

        assert!(matches!(
            service.delete_row(&group, "Members", 1, 0).await,
            Err(RuntimeError::InvalidOperation(_))
        ));
        service.add_row(&group, "Members", 1, member("Ada")).await.unwrap();
        assert!(service.add_row(&group, "Members", 1, member("Grace")).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_adds_keep_every_row() {
        let (service, group) = setup(FieldDefinition::new("Members", FieldType::Repeater)).await;
        let service = Arc::new(service);

        let mut handles = Vec::new();
        for i in 0..10 {
            let service = service.clone();
            let group = group.clone();
            handles.push(tokio::spawn(async move {
                service
                    .add_row(&group, "Members", 9, member(&format!("m{}", i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(service.rows(&group, "Members", 9).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_concurrent_changes_chain_before_and_after() {
        let (service, group) = setup(FieldDefinition::new("Members", FieldType::Repeater)).await;
        let service = Arc::new(service);

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = service.clone();
            let group = group.clone();
            handles.push(tokio::spawn(async move {
                service
                    .add_row(&group, "Members", 3, member(&format!("m{}", i)))
                    .await
                    .unwrap()
            }));
        }
        let mut changes = Vec::new();
        for handle in handles {
            changes.push(handle.await.unwrap());
        }

        // Each writer saw exactly the rows its predecessor left behind
        changes.sort_by_key(|change| change.outcome);
        for (i, change) in changes.iter().enumerate() {
            assert_eq!(change.before.len(), i);
            assert_eq!(change.after.len(), i + 1);
            assert_eq!(&change.after[..i], &change.before[..]);
            if i > 0 {
                assert_eq!(change.before, changes[i - 1].after);
            }
        }
    }

    #[tokio::test]
    async fn test_non_repeater_rejected() {
        let (service, group) = setup(FieldDefinition::new("Title", FieldType::ShortText)).await;
        assert!(matches!(
            service.rows(&group, "Title", 1).await,
            Err(RuntimeError::InvalidOperation(_))
        ));
        assert!(matches!(
            service.rows(&group, "Missing", 1).await,
            Err(RuntimeError::FieldNotFound(_))
        ));
    }
}
