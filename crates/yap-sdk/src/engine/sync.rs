//! Group registration, JSON import/export and directory sync

use super::{FieldEngine, ImportReport};
use crate::error::{Result, SdkError};
use std::collections::BTreeMap;
use tracing::{info, warn};
use yap_core::{FieldType, GroupName};
use yap_repository::{GroupDocument, GroupRepository, SyncStatus};
use yap_runtime::cache::values_group;

impl FieldEngine {
    /// Register a group from its document.
    ///
    /// Creates the tables when missing and upserts every definition,
    /// parents before their sub fields. Fields absent from the document are
    /// kept. Location rules and layouts are replaced wholesale.
    pub async fn register_field_group(&self, document: &GroupDocument) -> Result<ImportReport> {
        document.check()?;
        let group = document.group()?;
        let stored_hash = self
            .store
            .group_meta(&group)
            .await?
            .and_then(|meta| meta.content_hash);
        let status = document.sync_status(stored_hash.as_deref())?;

        if !self.schema.ensure_group_tables(&group, &[]).await {
            return Err(SdkError::Storage(format!(
                "could not create tables of group '{}'",
                group
            )));
        }

        let mut imported = 0;
        for (parent, mut definition) in document.flatten() {
            definition.id = None;
            definition.parent_id = match parent {
                Some(parent) => Some(
                    self.patterns
                        .find_field(&group, &parent)
                        .await
                        .and_then(|field| field.id)
                        .ok_or_else(|| super::field_not_found(&group, &parent))?,
                ),
                None => None,
            };

            if self.patterns.upsert_field(&group, &definition).await.is_none() {
                return Err(SdkError::Storage(format!(
                    "could not store field '{}' of group '{}'",
                    definition.generated_name, group
                )));
            }
            imported += 1;
        }

        self.store
            .replace_location_rules(&group, &document.location_rules())
            .await?;
        for (field_name, layouts) in &document.layouts {
            self.store.save_layouts(&group, field_name, layouts).await?;
        }

        let mut meta = document.to_meta()?;
        meta.modified = Some(chrono::Utc::now().timestamp());
        self.store.save_group_meta(&meta).await?;
        self.cache.flush(Some(values_group(group.as_str()).as_str())).await;

        info!(
            "Registered field group '{}' ({} field(s), {:?})",
            group, imported, status
        );
        Ok(ImportReport {
            group: group.to_string(),
            fields_imported: imported,
            status,
        })
    }

    /// Parse and register a JSON group document
    pub async fn import_group_json(&self, json: &str) -> Result<ImportReport> {
        let document = GroupDocument::from_json(json)?;
        self.register_field_group(&document).await
    }

    /// Document of a registered group
    pub async fn export_group(&self, group: &str) -> Result<GroupDocument> {
        let group = GroupName::new(group)?;
        let meta = self
            .store
            .group_meta(&group)
            .await?
            .ok_or_else(|| SdkError::NotFound(group.to_string()))?;

        let definitions = self.patterns.get_fields(&group).await;
        let rules = self.store.location_rules(&group).await?;

        let mut layouts = BTreeMap::new();
        for field in definitions
            .iter()
            .filter(|field| field.field_type == FieldType::FlexibleContent)
        {
            let field_layouts = self.store.layouts(&group, &field.generated_name).await?;
            if !field_layouts.is_empty() {
                layouts.insert(field.generated_name.clone(), field_layouts);
            }
        }

        Ok(GroupDocument::from_parts(&meta, &definitions, &rules, layouts))
    }

    /// Pretty-printed JSON document of a registered group
    pub async fn export_group_json(&self, group: &str) -> Result<String> {
        Ok(self.export_group(group).await?.to_json_pretty()?)
    }

    /// Import every new or modified document of the sync directory.
    ///
    /// Documents already in sync are skipped; a document that fails to
    /// import is logged and the rest still run.
    pub async fn sync_from_directory(&self) -> Result<Vec<ImportReport>> {
        let repository = self
            .sync
            .as_ref()
            .ok_or_else(|| SdkError::ConfigError("no sync directory configured".to_string()))?;

        let mut reports = Vec::new();
        for document in repository.load_all().await? {
            let Ok(group) = document.group() else {
                continue;
            };
            let stored_hash = match self.store.group_meta(&group).await {
                Ok(meta) => meta.and_then(|meta| meta.content_hash),
                Err(e) => {
                    warn!("Failed to read registration of group '{}': {}", group, e);
                    continue;
                }
            };
            if document.sync_status(stored_hash.as_deref())? == SyncStatus::InSync {
                continue;
            }

            match self.register_field_group(&document).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!("Failed to import group '{}': {}", group, e),
            }
        }

        info!(
            "Synced {} group(s) from {}",
            reports.len(),
            repository.root_path().display()
        );
        Ok(reports)
    }
}
