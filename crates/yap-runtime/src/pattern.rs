//! Field pattern store
//!
//! CRUD over a group's field definitions. Fields are addressed by either
//! their machine key or their label; when both would match different
//! fields, the machine key wins.

use crate::error::{Result, RuntimeError};
use crate::store::FieldStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use yap_core::{FieldDefinition, GroupName, TableDescriptor};

/// Field definition store
pub struct PatternStore {
    store: Arc<dyn FieldStore>,
}

impl PatternStore {
    pub fn new(store: Arc<dyn FieldStore>) -> Self {
        Self { store }
    }

    /// All definitions of a group, ordered by nesting depth then id.
    ///
    /// A missing table or driver error yields an empty list.
    pub async fn get_fields(&self, group: &GroupName) -> Vec<FieldDefinition> {
        match self.store.list_patterns(&group.tables()).await {
            Ok(fields) => order_by_depth(fields),
            Err(RuntimeError::TableMissing(_)) => Vec::new(),
            Err(e) => {
                warn!("Failed to load fields of group '{}': {}", group, e);
                Vec::new()
            }
        }
    }

    /// Look a field up by machine key or label
    pub async fn find_field(&self, group: &GroupName, name: &str) -> Option<FieldDefinition> {
        let fields = self.get_fields(group).await;
        pick(&fields, name, name).cloned()
    }

    /// Definitions whose parent is `parent_id`
    pub async fn sub_fields(&self, group: &GroupName, parent_id: i64) -> Vec<FieldDefinition> {
        self.get_fields(group)
            .await
            .into_iter()
            .filter(|field| field.parent_id == Some(parent_id))
            .collect()
    }

    /// Insert or update a definition, returning its row id.
    ///
    /// An existing field matches on machine key or label. Returns `None`
    /// when the write fails or the parent reference is invalid.
    pub async fn upsert_field(&self, group: &GroupName, field: &FieldDefinition) -> Option<i64> {
        match self.try_upsert(group, field).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(
                    "Failed to upsert field '{}' in group '{}': {}",
                    field.generated_name, group, e
                );
                None
            }
        }
    }

    async fn try_upsert(&self, group: &GroupName, field: &FieldDefinition) -> Result<i64> {
        let tables = group.tables();
        let existing = self.store.list_patterns(&tables).await?;

        let current = pick(&existing, &field.generated_name, &field.user_name);
        let current_id = current.and_then(|f| f.id);

        if let Some(parent_id) = field.parent_id {
            check_parent(&existing, current_id, parent_id)?;
        }

        match current_id {
            Some(id) => {
                self.store.update_pattern(&tables, id, field).await?;
                debug!("Updated field '{}' (id {}) in {}", field.generated_name, id, tables.pattern_table);
                Ok(id)
            }
            None => self.insert(&tables, field).await,
        }
    }

    async fn insert(&self, tables: &TableDescriptor, field: &FieldDefinition) -> Result<i64> {
        let id = self.store.insert_pattern(tables, field).await?;
        debug!("Inserted field '{}' (id {}) into {}", field.generated_name, id, tables.pattern_table);
        Ok(id)
    }
}

/// Machine key match first, then label match
fn pick<'a>(
    fields: &'a [FieldDefinition],
    generated_name: &str,
    user_name: &str,
) -> Option<&'a FieldDefinition> {
    fields
        .iter()
        .find(|f| f.generated_name == generated_name)
        .or_else(|| fields.iter().find(|f| f.user_name == user_name))
}

/// The parent must exist and must not be the field itself or one of its
/// descendants.
fn check_parent(fields: &[FieldDefinition], self_id: Option<i64>, parent_id: i64) -> Result<()> {
    let parents: HashMap<i64, Option<i64>> = fields
        .iter()
        .filter_map(|f| f.id.map(|id| (id, f.parent_id)))
        .collect();

    if !parents.contains_key(&parent_id) {
        return Err(RuntimeError::InvalidOperation(format!(
            "parent field {} does not exist",
            parent_id
        )));
    }

    let mut cursor = Some(parent_id);
    let mut steps = 0;
    while let Some(id) = cursor {
        if Some(id) == self_id {
            return Err(RuntimeError::InvalidOperation(format!(
                "parent field {} would create a cycle",
                parent_id
            )));
        }
        steps += 1;
        if steps > parents.len() {
            break;
        }
        cursor = parents.get(&id).copied().flatten();
    }
    Ok(())
}

/// Sort by depth in the parent tree, then by id
fn order_by_depth(mut fields: Vec<FieldDefinition>) -> Vec<FieldDefinition> {
    let parents: HashMap<i64, Option<i64>> = fields
        .iter()
        .filter_map(|f| f.id.map(|id| (id, f.parent_id)))
        .collect();

    let depth = |field: &FieldDefinition| -> usize {
        let mut depth = 0;
        let mut cursor = field.parent_id;
        while let Some(id) = cursor {
            depth += 1;
            if depth > parents.len() {
                break;
            }
            cursor = parents.get(&id).copied().flatten();
        }
        depth
    };

    fields.sort_by_cached_key(|f| (depth(f), f.id.unwrap_or(i64::MAX)));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use yap_core::FieldType;

    async fn setup() -> (PatternStore, GroupName) {
        let store = Arc::new(MemoryStore::new());
        let group = GroupName::new("team").unwrap();
        store.create_group_tables(&group.tables()).await.unwrap();
        (PatternStore::new(store), group)
    }

    #[tokio::test]
    async fn test_upsert_matches_either_key() {
        let (patterns, group) = setup().await;
        let field = FieldDefinition::new("Job Title", FieldType::ShortText);
        let id = patterns.upsert_field(&group, &field).await.unwrap();

        // Same label, different machine key: updates the existing row
        let renamed = field.clone().with_name("field_role");
        assert_eq!(patterns.upsert_field(&group, &renamed).await, Some(id));
        assert_eq!(patterns.get_fields(&group).await.len(), 1);
        assert!(patterns.find_field(&group, "field_role").await.is_some());
    }

    #[tokio::test]
    async fn test_machine_key_wins_over_label() {
        let (patterns, group) = setup().await;
        patterns
            .upsert_field(&group, &FieldDefinition::new("Email", FieldType::Email))
            .await
            .unwrap();
        patterns
            .upsert_field(
                &group,
                &FieldDefinition::new("field_email", FieldType::ShortText).with_name("field_other"),
            )
            .await
            .unwrap();

        let found = patterns.find_field(&group, "field_email").await.unwrap();
        assert_eq!(found.field_type, FieldType::Email);
    }

    #[tokio::test]
    async fn test_depth_then_id_order() {
        let (patterns, group) = setup().await;
        let parent = patterns
            .upsert_field(&group, &FieldDefinition::new("Members", FieldType::Repeater))
            .await
            .unwrap();
        patterns
            .upsert_field(
                &group,
                &FieldDefinition::new("Name", FieldType::ShortText).with_parent(parent),
            )
            .await
            .unwrap();
        patterns
            .upsert_field(&group, &FieldDefinition::new("Intro", FieldType::LongText))
            .await
            .unwrap();

        let names: Vec<String> = patterns
            .get_fields(&group)
            .await
            .into_iter()
            .map(|f| f.user_name)
            .collect();
        assert_eq!(names, vec!["Members", "Intro", "Name"]);
        assert_eq!(patterns.sub_fields(&group, parent).await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_parent_rejected() {
        let (patterns, group) = setup().await;
        let orphan = FieldDefinition::new("Orphan", FieldType::ShortText).with_parent(99);
        assert!(patterns.upsert_field(&group, &orphan).await.is_none());

        let id = patterns
            .upsert_field(&group, &FieldDefinition::new("Box", FieldType::NestedGroup))
            .await
            .unwrap();
        let own_parent = FieldDefinition::new("Box", FieldType::NestedGroup).with_parent(id);
        assert!(patterns.upsert_field(&group, &own_parent).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_group_is_empty() {
        let (patterns, _) = setup().await;
        let unknown = GroupName::new("unknown").unwrap();
        assert!(patterns.get_fields(&unknown).await.is_empty());
        assert!(patterns.find_field(&unknown, "anything").await.is_none());
    }
}
