//! Hook registry
//!
//! Filters are registered for a stage and a scope. When a stage runs, the
//! filters of each matching scope are applied in a fixed order:
//!
//! 1. `General` (every field)
//! 2. `Type` (fields of one type)
//! 3. `Name` (one field, by label or machine key)
//! 4. `Group` (every field of one group)
//!
//! Each filter receives the output of the previous one, so the last
//! matching filter has the final say.

pub mod sanitize;

pub use sanitize::sanitize;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;
use yap_core::{FieldDefinition, FieldType, GroupName, ValidationFailure, Value};

/// Pipeline stage a value filter runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    /// Field definition about to be used
    LoadField,
    /// Raw value just read from storage
    LoadValue,
    /// Value about to be returned to the reader
    FormatValue,
    /// Value about to be sanitised, validated and stored
    UpdateValue,
}

/// Which fields a hook applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookScope {
    General,
    Type(FieldType),
    Name(String),
    Group(String),
}

impl HookScope {
    fn rank(&self) -> u8 {
        match self {
            HookScope::General => 0,
            HookScope::Type(_) => 1,
            HookScope::Name(_) => 2,
            HookScope::Group(_) => 3,
        }
    }

    fn applies_to(&self, ctx: &HookContext) -> bool {
        match self {
            HookScope::General => true,
            HookScope::Type(field_type) => &ctx.field.field_type == field_type,
            HookScope::Name(name) => ctx.field.matches_name(name),
            HookScope::Group(group) => ctx.group.as_str() == group,
        }
    }
}

/// The field and post a hook is running for
#[derive(Debug, Clone)]
pub struct HookContext {
    pub group: GroupName,
    pub field: FieldDefinition,
    pub post_id: i64,
}

impl HookContext {
    pub fn new(group: GroupName, field: FieldDefinition, post_id: i64) -> Self {
        Self {
            group,
            field,
            post_id,
        }
    }
}

pub type ValueFilter = Arc<dyn Fn(Value, &HookContext) -> Value + Send + Sync>;
pub type FieldFilter = Arc<dyn Fn(FieldDefinition, &HookContext) -> FieldDefinition + Send + Sync>;

/// Custom validator.
///
/// `Ok(None)` accepts the value, `Ok(Some(message))` rejects it. An `Err`
/// is logged and the validator skipped.
pub type Validator = Arc<dyn Fn(&Value, &HookContext) -> anyhow::Result<Option<String>> + Send + Sync>;

#[derive(Default)]
struct Hooks {
    filters: Vec<(HookStage, HookScope, ValueFilter)>,
    field_filters: Vec<(HookScope, FieldFilter)>,
    validators: Vec<(HookScope, Validator)>,
}

/// Registry of filters and validators, shared by the pipeline
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<Hooks>,
    /// Bumped whenever a filter that shapes read values is added
    read_revision: AtomicU64,
}

/// Entries of `items` matching `ctx`, most general scope first,
/// registration order within a scope
fn in_scope_order<'a, T>(
    items: impl Iterator<Item = (&'a HookScope, &'a T)>,
    ctx: &HookContext,
) -> Vec<&'a T>
where
    T: 'a,
{
    let mut matching: Vec<(u8, usize, &T)> = items
        .enumerate()
        .filter(|(_, (scope, _))| scope.applies_to(ctx))
        .map(|(order, (scope, item))| (scope.rank(), order, item))
        .collect();
    matching.sort_by_key(|(rank, order, _)| (*rank, *order));
    matching.into_iter().map(|(_, _, item)| item).collect()
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Hooks> {
        self.hooks.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Hooks> {
        self.hooks.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a value filter
    pub fn add_filter<F>(&self, stage: HookStage, scope: HookScope, filter: F)
    where
        F: Fn(Value, &HookContext) -> Value + Send + Sync + 'static,
    {
        self.write().filters.push((stage, scope, Arc::new(filter)));
        if stage != HookStage::UpdateValue {
            self.read_revision.fetch_add(1, Ordering::Release);
        }
    }

    /// Register a `LoadField` filter over field definitions
    pub fn add_field_filter<F>(&self, scope: HookScope, filter: F)
    where
        F: Fn(FieldDefinition, &HookContext) -> FieldDefinition + Send + Sync + 'static,
    {
        self.write().field_filters.push((scope, Arc::new(filter)));
        self.read_revision.fetch_add(1, Ordering::Release);
    }

    /// Changes whenever formatted reads may differ from cached ones
    pub fn read_revision(&self) -> u64 {
        self.read_revision.load(Ordering::Acquire)
    }

    pub fn add_validator<F>(&self, scope: HookScope, validator: F)
    where
        F: Fn(&Value, &HookContext) -> anyhow::Result<Option<String>> + Send + Sync + 'static,
    {
        self.write().validators.push((scope, Arc::new(validator)));
    }

    /// Run the value filters of `stage`
    pub fn apply(&self, stage: HookStage, value: Value, ctx: &HookContext) -> Value {
        // Clone the handles so filters run without the lock held
        let hooks = self.read();
        let filters: Vec<ValueFilter> = in_scope_order(
            hooks
                .filters
                .iter()
                .filter(|(s, _, _)| *s == stage)
                .map(|(_, scope, filter)| (scope, filter)),
            ctx,
        )
        .into_iter()
        .cloned()
        .collect();
        drop(hooks);

        filters.iter().fold(value, |value, filter| filter(value, ctx))
    }

    /// Run the `LoadField` filters over the context's field definition
    pub fn apply_field(&self, ctx: &HookContext) -> FieldDefinition {
        let hooks = self.read();
        let filters: Vec<FieldFilter> =
            in_scope_order(hooks.field_filters.iter().map(|(s, f)| (s, f)), ctx)
                .into_iter()
                .cloned()
                .collect();
        drop(hooks);

        filters
            .iter()
            .fold(ctx.field.clone(), |field, filter| filter(field, ctx))
    }

    /// Run custom validators; the first rejection wins
    pub fn validate(&self, value: &Value, ctx: &HookContext) -> Result<(), ValidationFailure> {
        let hooks = self.read();
        let validators: Vec<Validator> =
            in_scope_order(hooks.validators.iter().map(|(s, v)| (s, v)), ctx)
                .into_iter()
                .cloned()
                .collect();
        drop(hooks);

        for validator in validators {
            match validator(value, ctx) {
                Ok(None) => {}
                Ok(Some(message)) => {
                    return Err(ValidationFailure::new(
                        ctx.field.user_name.clone(),
                        "custom",
                        message,
                    ))
                }
                Err(e) => warn!(
                    "Validator for '{}' failed, skipping: {}",
                    ctx.field.generated_name, e
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(field: FieldDefinition) -> HookContext {
        HookContext::new(GroupName::new("shop").unwrap(), field, 1)
    }

    fn suffix(tag: &'static str) -> impl Fn(Value, &HookContext) -> Value + Send + Sync {
        move |value, _| Value::String(format!("{}{}", value.to_storage_string(), tag))
    }

    #[test]
    fn test_read_revision_tracks_read_filters_only() {
        let hooks = HookRegistry::new();
        assert_eq!(hooks.read_revision(), 0);

        hooks.add_filter(HookStage::UpdateValue, HookScope::General, suffix("!"));
        hooks.add_validator(HookScope::General, |_, _| Ok(None));
        assert_eq!(hooks.read_revision(), 0);

        hooks.add_filter(HookStage::FormatValue, HookScope::General, suffix("!"));
        hooks.add_field_filter(HookScope::General, |field, _| field);
        assert_eq!(hooks.read_revision(), 2);
    }

    #[test]
    fn test_specificity_order_regardless_of_registration() {
        let hooks = HookRegistry::new();
        hooks.add_filter(HookStage::FormatValue, HookScope::Group("shop".into()), suffix("-group"));
        hooks.add_filter(HookStage::FormatValue, HookScope::Name("Title".into()), suffix("-name"));
        hooks.add_filter(HookStage::FormatValue, HookScope::Type(FieldType::ShortText), suffix("-type"));
        hooks.add_filter(HookStage::FormatValue, HookScope::General, suffix("-general"));

        let ctx = ctx(FieldDefinition::new("Title", FieldType::ShortText));
        let value = hooks.apply(HookStage::FormatValue, Value::from("v"), &ctx);
        assert_eq!(value, Value::from("v-general-type-name-group"));
    }

    #[test]
    fn test_last_writer_wins_and_stage_isolation() {
        let hooks = HookRegistry::new();
        hooks.add_filter(HookStage::LoadValue, HookScope::General, |_, _| Value::from("first"));
        hooks.add_filter(HookStage::LoadValue, HookScope::General, |_, _| Value::from("second"));

        let ctx = ctx(FieldDefinition::new("Title", FieldType::ShortText));
        assert_eq!(hooks.apply(HookStage::LoadValue, Value::Null, &ctx), Value::from("second"));
        assert_eq!(hooks.apply(HookStage::UpdateValue, Value::Null, &ctx), Value::Null);
    }

    #[test]
    fn test_scope_mismatch_is_skipped() {
        let hooks = HookRegistry::new();
        hooks.add_filter(HookStage::FormatValue, HookScope::Group("blog".into()), suffix("-blog"));
        hooks.add_filter(HookStage::FormatValue, HookScope::Type(FieldType::Number), suffix("-num"));

        let ctx = ctx(FieldDefinition::new("Title", FieldType::ShortText));
        assert_eq!(hooks.apply(HookStage::FormatValue, Value::from("v"), &ctx), Value::from("v"));
    }

    #[test]
    fn test_field_filter() {
        let hooks = HookRegistry::new();
        hooks.add_field_filter(HookScope::Name("field_title".into()), |mut field, _| {
            field.user_name = "Headline".to_string();
            field
        });

        let ctx = ctx(FieldDefinition::new("Title", FieldType::ShortText));
        assert_eq!(hooks.apply_field(&ctx).user_name, "Headline");
    }

    #[test]
    fn test_validators() {
        let hooks = HookRegistry::new();
        hooks.add_validator(HookScope::General, |_, _| Err(anyhow::anyhow!("broken validator")));
        hooks.add_validator(HookScope::Type(FieldType::ShortText), |value, _| {
            Ok((value.as_str() == Some("forbidden")).then(|| "Word not allowed".to_string()))
        });

        let ctx = ctx(FieldDefinition::new("Title", FieldType::ShortText));
        assert!(hooks.validate(&Value::from("fine"), &ctx).is_ok());

        let failure = hooks.validate(&Value::from("forbidden"), &ctx).unwrap_err();
        assert_eq!(failure.rule, "custom");
        assert_eq!(failure.message, "Word not allowed");
    }
}
