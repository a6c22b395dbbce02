//! Field read/write pipeline
//!
//! Read: load_field -> cache -> load_value -> format_value -> cache.
//! Write: load_field -> update_value -> sanitize -> validate (rules, then
//! custom validators) -> persist -> `ValueUpdated`.
//!
//! Adding a read filter flushes the cache before the next read.

use crate::cache::{value_key, values_group, CacheLayer};
use crate::error::{Result, RuntimeError};
use crate::events::{EventBus, ValueUpdated};
use crate::hooks::{sanitize, HookContext, HookRegistry, HookStage};
use crate::pattern::PatternStore;
use crate::values::ValueStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use yap_core::field::validate;
use yap_core::{FieldDefinition, FieldEntry, GroupName, Value};

/// Default TTL of cached field values, in seconds
pub const DEFAULT_FIELD_CACHE_TTL: u64 = 3600;

pub struct FieldPipeline {
    patterns: Arc<PatternStore>,
    values: Arc<ValueStore>,
    hooks: Arc<HookRegistry>,
    events: Arc<EventBus>,
    cache: Arc<CacheLayer>,
    cache_ttl: u64,
    /// Hook read revision the cached values were formatted under
    cached_revision: AtomicU64,
}

impl FieldPipeline {
    pub fn new(
        patterns: Arc<PatternStore>,
        values: Arc<ValueStore>,
        hooks: Arc<HookRegistry>,
        events: Arc<EventBus>,
        cache: Arc<CacheLayer>,
    ) -> Self {
        let cached_revision = AtomicU64::new(hooks.read_revision());
        Self {
            patterns,
            values,
            hooks,
            events,
            cache,
            cache_ttl: DEFAULT_FIELD_CACHE_TTL,
            cached_revision,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: u64) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Context with the `LoadField` filters applied to the definition
    fn context(&self, group: &GroupName, field: FieldDefinition, post_id: i64) -> HookContext {
        let mut ctx = HookContext::new(group.clone(), field, post_id);
        ctx.field = self.hooks.apply_field(&ctx);
        ctx
    }

    /// Drop formatted values cached before the read filters last changed
    async fn refresh_cache(&self) {
        let current = self.hooks.read_revision();
        if self.cached_revision.swap(current, Ordering::AcqRel) != current {
            debug!("Read filters changed, flushing cached field values");
            self.cache.flush(None).await;
        }
    }

    /// Formatted value of one field, served from cache when present
    pub async fn read(&self, group: &GroupName, field_name: &str, post_id: i64) -> Option<Value> {
        self.refresh_cache().await;
        let Some(field) = self.patterns.find_field(group, field_name).await else {
            // Values without a definition are returned raw
            return self.values.get_value(field_name, post_id, group).await;
        };

        let key = value_key(&field.generated_name, post_id);
        let cache_group = values_group(group.as_str());
        if let Some(cached) = self.cache.get(&key, &cache_group).await {
            return Some(cached);
        }

        let ctx = self.context(group, field, post_id);
        let raw = self.values.get_for_definition(&ctx.field, post_id, group).await?;
        let value = self.format(raw, &ctx);

        self.cache.set(&key, &value, &cache_group, self.cache_ttl).await;
        Some(value)
    }

    fn format(&self, raw: Value, ctx: &HookContext) -> Value {
        let loaded = self.hooks.apply(HookStage::LoadValue, raw, ctx);
        self.hooks.apply(HookStage::FormatValue, loaded, ctx)
    }

    /// Every stored value of a post in the group, formatted
    pub async fn read_all(&self, group: &GroupName, post_id: i64) -> Vec<FieldEntry> {
        let entries = self.values.get_all_values(post_id, group).await;
        if entries.is_empty() {
            return entries;
        }

        let definitions: HashMap<String, FieldDefinition> = self
            .patterns
            .get_fields(group)
            .await
            .into_iter()
            .map(|f| (f.generated_name.clone(), f))
            .collect();

        entries
            .into_iter()
            .map(|mut entry| {
                if let Some(field) = definitions.get(&entry.name) {
                    let ctx = self.context(group, field.clone(), post_id);
                    entry.value = self.format(entry.value, &ctx);
                }
                entry
            })
            .collect()
    }

    /// Current values of the post keyed by label and machine key, with
    /// `pending` standing in for the field being written
    async fn sibling_values(
        &self,
        group: &GroupName,
        post_id: i64,
        field: &FieldDefinition,
        pending: &Value,
    ) -> HashMap<String, Value> {
        let mut siblings = HashMap::new();
        for entry in self.values.get_all_values(post_id, group).await {
            siblings.insert(entry.label, entry.value.clone());
            siblings.insert(entry.name, entry.value);
        }
        siblings.insert(field.user_name.clone(), pending.clone());
        siblings.insert(field.generated_name.clone(), pending.clone());
        siblings
    }

    /// Write a value through the full pipeline.
    ///
    /// `Ok(false)` when the field is unknown or storage fails,
    /// `Err(Validation)` when the value is rejected. Nothing is persisted
    /// unless the result is `Ok(true)`.
    pub async fn write(
        &self,
        group: &GroupName,
        field_name: &str,
        value: Value,
        post_id: i64,
    ) -> Result<bool> {
        let Some(field) = self.patterns.find_field(group, field_name).await else {
            debug!("Field '{}' not found in group '{}'", field_name, group);
            return Ok(false);
        };
        let ctx = self.context(group, field, post_id);
        let field = &ctx.field;

        let value = self.hooks.apply(HookStage::UpdateValue, value, &ctx);
        let value = sanitize(value, field);

        let visible = match &field.conditional_logic {
            Some(logic) => logic.is_visible(&self.sibling_values(group, post_id, field, &value).await),
            None => true,
        };
        validate(&value, field, visible).map_err(RuntimeError::Validation)?;
        self.hooks
            .validate(&value, &ctx)
            .map_err(RuntimeError::Validation)?;

        let old_value = self.values.get_for_definition(field, post_id, group).await;
        if let Err(e) = self
            .values
            .set_for_definition(field, &value, post_id, group)
            .await
        {
            warn!(
                "Failed to persist '{}' for post {}: {}",
                field.generated_name, post_id, e
            );
            return Ok(false);
        }

        self.events
            .dispatch(&ValueUpdated {
                group: group.clone(),
                field_name: field.generated_name.clone(),
                field_label: field.user_name.clone(),
                old_value,
                new_value: value,
                post_id,
            })
            .await;
        Ok(true)
    }
}
