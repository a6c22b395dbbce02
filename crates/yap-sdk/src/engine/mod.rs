//! FieldEngine - Main API for reading and writing field values
//!
//! Every service is constructed once by [`FieldEngineBuilder`] and shared
//! through `Arc`s. Reads and writes go through the hook pipeline; group
//! documents go through the schema registry and pattern store.
//!
//! [`FieldEngineBuilder`]: crate::FieldEngineBuilder

mod content;
mod sync;
mod types;

pub use types::{GroupValues, ImportReport};

use crate::config::EngineConfig;
use crate::error::{Result, SdkError};
use std::sync::Arc;
use tracing::{debug, warn};
use yap_core::location::{group_rule_sets, matches};
use yap_core::{FieldEntry, GroupMeta, GroupName, PostContext, Value};
use yap_repository::FileSystemRepository;
use yap_runtime::cache::values_group;
use yap_runtime::computed::computed_group;
use yap_runtime::{
    CacheLayer, CacheStats, ComputeContext, ComputedFields, ComputedOptions, EventBus,
    FieldPipeline, FieldStore, FlexibleContent, HookRegistry, PatternStore, RepeaterService,
    SchemaRegistry, ValueStore,
};

/// Main custom fields engine
pub struct FieldEngine {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<dyn FieldStore>,
    pub(crate) schema: Arc<SchemaRegistry>,
    pub(crate) patterns: Arc<PatternStore>,
    pub(crate) values: Arc<ValueStore>,
    pub(crate) hooks: Arc<HookRegistry>,
    pub(crate) cache: Arc<CacheLayer>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) computed: Arc<ComputedFields>,
    pub(crate) repeaters: Arc<RepeaterService>,
    pub(crate) flexible: Arc<FlexibleContent>,
    pub(crate) pipeline: Arc<FieldPipeline>,
    /// Sync directory, when configured
    pub(crate) sync: Option<FileSystemRepository>,
}

/// Parse a group name for a read; invalid names read as absent
fn read_group(group: &str) -> Option<GroupName> {
    match GroupName::new(group) {
        Ok(name) => Some(name),
        Err(e) => {
            debug!("Ignoring read of group '{}': {}", group, e);
            None
        }
    }
}

impl FieldEngine {
    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Filter and validator registry consulted by every read and write
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Value-updated subscribers
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    pub fn patterns(&self) -> &Arc<PatternStore> {
        &self.patterns
    }

    // ========== Values ==========

    /// Formatted value of one field, `None` when the group, field or value
    /// does not exist
    pub async fn get_field(&self, group: &str, name: &str, post_id: i64) -> Option<Value> {
        let group = read_group(group)?;
        self.pipeline.read(&group, name, post_id).await
    }

    /// Every formatted value of a post in the group
    pub async fn get_fields(&self, group: &str, post_id: i64) -> Vec<FieldEntry> {
        match read_group(group) {
            Some(group) => self.pipeline.read_all(&group, post_id).await,
            None => Vec::new(),
        }
    }

    /// Write one value through the pipeline.
    ///
    /// `Ok(false)` when the field is unknown or storage refused the write,
    /// [`SdkError::Validation`] when the value was rejected. Nothing is
    /// stored unless the result is `Ok(true)`.
    pub async fn update_field(
        &self,
        group: &str,
        name: &str,
        value: impl Into<Value>,
        post_id: i64,
    ) -> Result<bool> {
        let group = GroupName::new(group)?;
        Ok(self.pipeline.write(&group, name, value.into(), post_id).await?)
    }

    /// Values of every group a nested group field references
    pub async fn get_nested_group(&self, group: &str, name: &str, post_id: i64) -> Vec<FieldEntry> {
        match read_group(group) {
            Some(group) => self.values.get_nested_group(name, post_id, &group).await,
            None => Vec::new(),
        }
    }

    // ========== Location resolution ==========

    /// Active registered groups whose location rules hold for the post.
    ///
    /// Groups without a registration record never apply. A group whose
    /// rules cannot be read is skipped.
    pub async fn groups_for_post(&self, post: &PostContext) -> Vec<GroupMeta> {
        let registered = match self.store.list_group_meta().await {
            Ok(registered) => registered,
            Err(e) => {
                warn!("Failed to list field groups: {}", e);
                return Vec::new();
            }
        };

        let mut applicable = Vec::new();
        for meta in registered.into_iter().filter(|meta| meta.active) {
            let rules = match self.store.location_rules(&meta.name).await {
                Ok(rules) => rules,
                Err(e) => {
                    warn!("Failed to load location rules of group '{}': {}", meta.name, e);
                    continue;
                }
            };
            if matches(post, &group_rule_sets(rules)) {
                applicable.push(meta);
            }
        }
        debug!("{} group(s) apply to post {}", applicable.len(), post.id);
        applicable
    }

    /// Formatted values of every group applicable to the post
    pub async fn get_fields_for_post(&self, post: &PostContext) -> Vec<GroupValues> {
        let mut out = Vec::new();
        for meta in self.groups_for_post(post).await {
            let fields = self.pipeline.read_all(&meta.name, post.id).await;
            out.push(GroupValues {
                group: meta.name.to_string(),
                title: meta.title,
                fields,
            });
        }
        out
    }

    // ========== Computed fields ==========

    /// Register a computed field.
    ///
    /// Fails with a dependency cycle error, leaving the registry unchanged,
    /// when `dependencies` reach `name` again.
    pub fn register_computed<F>(
        &self,
        name: impl Into<String>,
        dependencies: Vec<String>,
        options: ComputedOptions,
        callback: F,
    ) -> Result<()>
    where
        F: Fn(&std::collections::HashMap<String, Value>, &ComputeContext) -> anyhow::Result<Value>
            + Send
            + Sync
            + 'static,
    {
        Ok(self.computed.register(name, dependencies, options, callback)?)
    }

    /// Current value of a computed field, `None` when it is not registered
    /// or its callback failed
    pub async fn get_computed_value(&self, group: &str, name: &str, post_id: i64) -> Option<Value> {
        let group = read_group(group)?;
        self.computed.calculate(name, post_id, &group).await
    }

    pub fn computed(&self) -> &Arc<ComputedFields> {
        &self.computed
    }

    // ========== Cache ==========

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Flush cached values of one group, or everything
    pub async fn flush_cache(&self, group: Option<&str>) -> bool {
        let Some(group) = group else {
            return self.cache.flush(None).await;
        };
        let Some(group) = read_group(group) else {
            return false;
        };
        let fields = self.cache.flush(Some(values_group(group.as_str()).as_str())).await;
        let computed = self.cache.flush(Some(computed_group(&group).as_str())).await;
        fields && computed
    }
}

impl std::fmt::Debug for FieldEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldEngine")
            .field("config", &self.config)
            .field("sync", &self.sync.as_ref().map(|repo| repo.root_path().to_path_buf()))
            .finish_non_exhaustive()
    }
}

/// Not-found error for a field of a group
pub(crate) fn field_not_found(group: &GroupName, name: &str) -> SdkError {
    SdkError::NotFound(format!("{}.{}", group, name))
}
