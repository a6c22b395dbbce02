//! Value-updated events
//!
//! Every successful write publishes a [`ValueUpdated`] event. Subscribers
//! run sequentially in registration order; a failing subscriber is logged
//! and never affects the write or the subscribers after it.

use crate::cache::{value_key, values_group, CacheLayer};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use yap_core::{GroupName, Value};

/// A field value of a post changed
#[derive(Debug, Clone, PartialEq)]
pub struct ValueUpdated {
    pub group: GroupName,
    /// Machine key of the field
    pub field_name: String,
    pub field_label: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
    pub post_id: i64,
}

impl ValueUpdated {
    /// True when `name` is the updated field's label or machine key
    pub fn concerns(&self, name: &str) -> bool {
        self.field_name == name || self.field_label == name
    }
}

/// Receives value-updated events
#[async_trait::async_trait]
pub trait FieldEventSubscriber: Send + Sync {
    /// Subscriber name, for logs
    fn name(&self) -> &str;

    async fn on_value_updated(&self, event: &ValueUpdated) -> anyhow::Result<()>;
}

/// Ordered subscriber list
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn FieldEventSubscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn FieldEventSubscriber>) {
        debug!("Subscribing '{}' to value updates", subscriber.name());
        self.subscribers.write().await.push(subscriber);
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Deliver `event` to every subscriber in order
    pub async fn dispatch(&self, event: &ValueUpdated) {
        let subscribers: Vec<Arc<dyn FieldEventSubscriber>> =
            self.subscribers.read().await.iter().cloned().collect();

        for subscriber in subscribers {
            if let Err(e) = subscriber.on_value_updated(event).await {
                warn!(
                    "Subscriber '{}' failed on update of '{}' for post {}: {}",
                    subscriber.name(),
                    event.field_name,
                    event.post_id,
                    e
                );
            }
        }
    }
}

/// Drops the cached value of the updated field
pub struct CacheInvalidator {
    cache: Arc<CacheLayer>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<CacheLayer>) -> Self {
        Self { cache }
    }
}

#[async_trait::async_trait]
impl FieldEventSubscriber for CacheInvalidator {
    fn name(&self) -> &str {
        "cache-invalidator"
    }

    async fn on_value_updated(&self, event: &ValueUpdated) -> anyhow::Result<()> {
        let group = values_group(event.group.as_str());
        let key = value_key(&event.field_name, event.post_id);
        if !self.cache.delete(&key, &group).await {
            anyhow::bail!("cache backend rejected delete of {}", key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        name: String,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl FieldEventSubscriber for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_value_updated(&self, event: &ValueUpdated) -> anyhow::Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event.field_name));
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    fn event() -> ValueUpdated {
        ValueUpdated {
            group: GroupName::new("pricing").unwrap(),
            field_name: "field_base_price".to_string(),
            field_label: "Base Price".to_string(),
            old_value: None,
            new_value: Value::Number(100.0),
            post_id: 42,
        }
    }

    #[tokio::test]
    async fn test_dispatch_order_survives_failures() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for (name, fail) in [("first", true), ("second", false)] {
            bus.subscribe(Arc::new(Recorder {
                name: name.to_string(),
                seen: seen.clone(),
                fail,
            }))
            .await;
        }

        bus.dispatch(&event()).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:field_base_price", "second:field_base_price"]
        );
    }

    #[tokio::test]
    async fn test_cache_invalidator() {
        let cache = Arc::new(CacheLayer::new());
        let key = value_key("field_base_price", 42);
        cache.set(&key, &Value::Number(1.0), &values_group("pricing"), 0).await;

        let invalidator = CacheInvalidator::new(cache.clone());
        invalidator.on_value_updated(&event()).await.unwrap();
        assert_eq!(cache.get(&key, &values_group("pricing")).await, None);
        assert!(event().concerns("Base Price"));
    }
}
