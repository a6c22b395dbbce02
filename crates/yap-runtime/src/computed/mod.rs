//! Computed fields
//!
//! A computed field derives its value from other fields of the same post
//! through a registered callback. Registrations are process wide and live
//! for the lifetime of the engine.
//!
//! On every value update the dependents of the updated field are
//! invalidated and recalculated eagerly; dependents of recalculated fields
//! follow in turn. Registrations that would close a dependency cycle are
//! rejected, and propagation visits each computed field at most once per
//! update.

mod format;

pub use format::ComputedFormat;

use crate::cache::{value_key, values_group, CacheLayer};
use crate::error::{Result, RuntimeError};
use crate::events::{FieldEventSubscriber, ValueUpdated};
use crate::pattern::PatternStore;
use crate::values::ValueStore;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use yap_core::{GroupName, Value};

/// Context handed to a computed field callback
#[derive(Debug, Clone)]
pub struct ComputeContext {
    pub field_name: String,
    pub post_id: i64,
    pub group: GroupName,
}

/// Callback deriving a value from the dependency values, keyed by the
/// dependency names as declared. Missing dependencies are `Value::Null`.
pub type ComputeFn =
    Arc<dyn Fn(&HashMap<String, Value>, &ComputeContext) -> anyhow::Result<Value> + Send + Sync>;

/// Registration options
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedOptions {
    /// Cache computed values
    pub cache: bool,
    /// Cache TTL in seconds, 0 never expires
    pub cache_ttl: u64,
    /// Persist computed values into the group's data table when the group
    /// defines a field of the same name
    pub store_in_db: bool,
    /// Skip the cache on reads
    pub recalc_on_read: bool,
    pub format: Option<ComputedFormat>,
}

impl Default for ComputedOptions {
    fn default() -> Self {
        Self {
            cache: true,
            cache_ttl: 3600,
            store_in_db: false,
            recalc_on_read: false,
            format: None,
        }
    }
}

impl ComputedOptions {
    pub fn with_format(mut self, format: ComputedFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_cache(mut self, cache: bool, ttl: u64) -> Self {
        self.cache = cache;
        self.cache_ttl = ttl;
        self
    }

    pub fn stored(mut self) -> Self {
        self.store_in_db = true;
        self
    }

    pub fn recalculated_on_read(mut self) -> Self {
        self.recalc_on_read = true;
        self
    }
}

/// A registered computed field
#[derive(Clone)]
pub struct ComputedField {
    pub name: String,
    pub dependencies: Vec<String>,
    pub options: ComputedOptions,
    callback: ComputeFn,
}

impl std::fmt::Debug for ComputedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedField")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("options", &self.options)
            .finish()
    }
}

/// Cache group of the computed values of one field group
pub fn computed_group(group: &GroupName) -> String {
    format!("computed_{}", group)
}

/// Registry and calculator of computed fields
pub struct ComputedFields {
    registry: RwLock<Vec<Arc<ComputedField>>>,
    values: Arc<ValueStore>,
    patterns: Arc<PatternStore>,
    cache: Arc<CacheLayer>,
    default_currency: String,
    recompute_count: AtomicU64,
}

impl ComputedFields {
    pub fn new(values: Arc<ValueStore>, patterns: Arc<PatternStore>, cache: Arc<CacheLayer>) -> Self {
        Self {
            registry: RwLock::new(Vec::new()),
            values,
            patterns,
            cache,
            default_currency: String::new(),
            recompute_count: AtomicU64::new(0),
        }
    }

    /// Currency suffix of price formats that name none
    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    fn snapshot(&self) -> Vec<Arc<ComputedField>> {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lookup(&self, name: &str) -> Option<Arc<ComputedField>> {
        self.snapshot().into_iter().find(|f| f.name == name)
    }

    /// Register a computed field, replacing any registration of the same
    /// name. Fails with `DependencyCycle` when the dependencies lead back
    /// to `name`.
    pub fn register<F>(
        &self,
        name: impl Into<String>,
        dependencies: Vec<String>,
        options: ComputedOptions,
        callback: F,
    ) -> Result<()>
    where
        F: Fn(&HashMap<String, Value>, &ComputeContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());

        if let Some(path) = find_cycle(&registry, &name, &dependencies) {
            return Err(RuntimeError::DependencyCycle(path.join(" -> ")));
        }

        let field = Arc::new(ComputedField {
            name: name.clone(),
            dependencies,
            options,
            callback: Arc::new(callback),
        });
        match registry.iter_mut().find(|f| f.name == name) {
            Some(existing) => *existing = field,
            None => registry.push(field),
        }
        info!("Registered computed field '{}'", name);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn registered(&self) -> Vec<String> {
        self.snapshot().iter().map(|f| f.name.clone()).collect()
    }

    /// Computed fields declaring a dependency on any of `names`, in
    /// registration order
    pub fn dependents_of(&self, names: &[&str]) -> Vec<String> {
        self.snapshot()
            .iter()
            .filter(|f| f.dependencies.iter().any(|d| names.contains(&d.as_str())))
            .map(|f| f.name.clone())
            .collect()
    }

    /// Number of callback invocations so far
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count.load(Ordering::Relaxed)
    }

    /// Value of a computed field for a post. Unregistered fields and
    /// failing callbacks yield `None`.
    pub async fn calculate(&self, name: &str, post_id: i64, group: &GroupName) -> Option<Value> {
        let field = self.lookup(name)?;
        let limit = self.snapshot().len();
        self.compute(field, post_id, group, 0, limit).await
    }

    fn compute<'a>(
        &'a self,
        field: Arc<ComputedField>,
        post_id: i64,
        group: &'a GroupName,
        depth: usize,
        limit: usize,
    ) -> BoxFuture<'a, Option<Value>> {
        Box::pin(async move {
            if depth > limit {
                warn!("Computed field '{}' exceeded dependency depth {}", field.name, limit);
                return None;
            }

            let key = value_key(&field.name, post_id);
            let cache_group = computed_group(group);
            if field.options.cache && !field.options.recalc_on_read {
                if let Some(value) = self.cache.get(&key, &cache_group).await {
                    return Some(value);
                }
            }

            let mut inputs = HashMap::with_capacity(field.dependencies.len());
            for dependency in &field.dependencies {
                let value = match self.lookup(dependency) {
                    Some(upstream) => self.compute(upstream, post_id, group, depth + 1, limit).await,
                    None => self.values.get_value(dependency, post_id, group).await,
                };
                inputs.insert(dependency.clone(), value.unwrap_or_default());
            }

            let ctx = ComputeContext {
                field_name: field.name.clone(),
                post_id,
                group: group.clone(),
            };
            self.recompute_count.fetch_add(1, Ordering::Relaxed);
            let raw = match (field.callback)(&inputs, &ctx) {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        "Computed field '{}' failed for post {}: {}",
                        field.name, post_id, e
                    );
                    return None;
                }
            };

            let value = match &field.options.format {
                Some(format) => format.apply(raw, &self.default_currency),
                None => raw,
            };

            if field.options.cache {
                self.cache
                    .set(&key, &value, &cache_group, field.options.cache_ttl)
                    .await;
            }
            if field.options.store_in_db {
                self.persist(&field.name, &value, post_id, group).await;
            }
            Some(value)
        })
    }

    async fn persist(&self, name: &str, value: &Value, post_id: i64, group: &GroupName) {
        let Some(definition) = self.patterns.find_field(group, name).await else {
            debug!("No field '{}' in group '{}' to store computed value", name, group);
            return;
        };
        match self
            .values
            .set_for_definition(&definition, value, post_id, group)
            .await
        {
            // The formatted read of the stored field is cached separately
            Ok(()) => {
                self.cache
                    .delete(
                        &value_key(&definition.generated_name, post_id),
                        &values_group(group.as_str()),
                    )
                    .await;
            }
            Err(e) => warn!("Failed to store computed field '{}': {}", name, e),
        }
    }

    /// Drop the cached value of a computed field
    pub async fn invalidate(&self, name: &str, post_id: i64, group: &GroupName) {
        self.cache
            .delete(&value_key(name, post_id), &computed_group(group))
            .await;
    }

    /// Recalculate everything downstream of the changed names.
    ///
    /// Returns the names of the computed fields recalculated, sorted.
    pub async fn propagate(&self, changed: &[&str], post_id: i64, group: &GroupName) -> Vec<String> {
        let mut queue: VecDeque<String> = self
            .dependents_of(changed)
            .into_iter()
            .collect();
        let mut visited: HashSet<String> = HashSet::new();
        let bound = self.snapshot().len();

        while let Some(name) = queue.pop_front() {
            if visited.len() >= bound || !visited.insert(name.clone()) {
                continue;
            }

            self.invalidate(&name, post_id, group).await;
            if self.calculate(&name, post_id, group).await.is_none() {
                debug!("Computed field '{}' has no value for post {}", name, post_id);
            }
            queue.extend(self.dependents_of(&[name.as_str()]));
        }

        let mut order: Vec<String> = visited.into_iter().collect();
        order.sort();
        order
    }
}

#[async_trait::async_trait]
impl FieldEventSubscriber for ComputedFields {
    fn name(&self) -> &str {
        "computed-recalculator"
    }

    async fn on_value_updated(&self, event: &ValueUpdated) -> anyhow::Result<()> {
        let changed = [event.field_name.as_str(), event.field_label.as_str()];
        let recomputed = self.propagate(&changed, event.post_id, &event.group).await;
        if !recomputed.is_empty() {
            debug!(
                "Recalculated {:?} after update of '{}'",
                recomputed, event.field_name
            );
        }
        Ok(())
    }
}

/// Path from `name` back to itself through the registered dependencies,
/// if adding `dependencies` to `name` would close one
fn find_cycle(
    registry: &[Arc<ComputedField>],
    name: &str,
    dependencies: &[String],
) -> Option<Vec<String>> {
    let edges: HashMap<&str, &[String]> = registry
        .iter()
        .filter(|f| f.name != name)
        .map(|f| (f.name.as_str(), f.dependencies.as_slice()))
        .collect();

    let mut stack: Vec<Vec<String>> = dependencies
        .iter()
        .map(|d| vec![name.to_string(), d.clone()])
        .collect();
    let mut seen: HashSet<String> = HashSet::new();

    while let Some(path) = stack.pop() {
        let Some(last) = path.last() else {
            continue;
        };
        if last == name {
            return Some(path);
        }
        if !seen.insert(last.clone()) {
            continue;
        }
        if let Some(next) = edges.get(last.as_str()) {
            for dependency in next.iter() {
                let mut extended = path.clone();
                extended.push(dependency.clone());
                stack.push(extended);
            }
        }
    }
    None
}
