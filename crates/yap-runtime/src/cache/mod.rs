//! Cache layer
//!
//! Two tiers consulted in order:
//! - process memory, per process and never shared
//! - an optional backend driver (Redis, shared object cache or files)
//!
//! Keys are namespaced as `group:sha256(key)`. A TTL of 0 means the entry
//! never expires, in either tier.

mod file;
mod object;
#[cfg(feature = "redis")]
mod redis_driver;

pub use file::FileDriver;
pub use object::ObjectCacheDriver;
#[cfg(feature = "redis")]
pub use redis_driver::RedisDriver;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use yap_core::Value;

/// A backend entry with the absolute expiry (unix seconds) it was stored with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub payload: String,
    pub expires_at: Option<u64>,
}

impl CachedPayload {
    pub fn new(payload: impl Into<String>, expires_at: Option<u64>) -> Self {
        Self {
            payload: payload.into(),
            expires_at,
        }
    }
}

/// Storage behind the memory tier. Payloads are JSON encoded values.
#[async_trait::async_trait]
pub trait CacheDriver: Send + Sync {
    /// Driver name, for logs
    fn name(&self) -> &str;

    /// Live entry under `key`; expired entries read as `None`
    async fn get(&self, key: &str) -> Result<Option<CachedPayload>>;

    /// Store a payload; `ttl` of 0 never expires
    async fn set(&self, key: &str, payload: &str, ttl: u64) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every entry of `group`, or everything when `None`
    async fn flush(&self, group: Option<&str>) -> Result<()>;
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Absolute expiry for a TTL; `None` for TTL 0
pub(crate) fn expiry(ttl: u64) -> Option<u64> {
    (ttl > 0).then(|| now_secs() + ttl)
}

pub(crate) fn is_expired(expires_at: Option<u64>) -> bool {
    matches!(expires_at, Some(at) if now_secs() >= at)
}

/// Group part of a namespaced key
pub(crate) fn key_group(key: &str) -> &str {
    key.split_once(':').map(|(group, _)| group).unwrap_or("")
}

/// Cache group holding the formatted values of one field group
pub fn values_group(group: &str) -> String {
    format!("fields_{}", group)
}

/// Cache key of one field value of one post
pub fn value_key(field_name: &str, post_id: i64) -> String {
    format!("{}:{}", field_name, post_id)
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    expires_at: Option<u64>,
}

/// Cache hit/miss statistics
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub memory_hits: u64,
    pub backend_hits: u64,
}

impl CacheStats {
    /// Hit rate as a fraction in [0, 1]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Two-tier cache shared by the pipeline and computed fields
pub struct CacheLayer {
    memory: RwLock<HashMap<String, MemoryEntry>>,
    backend: Option<Arc<dyn CacheDriver>>,
    enable_stats: bool,
    stats: RwLock<CacheStats>,
}

impl CacheLayer {
    /// Memory-only cache with statistics enabled
    pub fn new() -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            backend: None,
            enable_stats: true,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn CacheDriver>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_stats(mut self, enabled: bool) -> Self {
        self.enable_stats = enabled;
        self
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Namespaced key: `group:sha256(key)`
    pub fn build_key(key: &str, group: &str) -> String {
        format!("{}:{:x}", group, Sha256::digest(key.as_bytes()))
    }

    async fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if self.enable_stats {
            update(&mut *self.stats.write().await);
        }
    }

    /// Look a key up, memory first. Backend hits are promoted to memory.
    pub async fn get(&self, key: &str, group: &str) -> Option<Value> {
        let full_key = Self::build_key(key, group);

        let cached = self
            .memory
            .read()
            .await
            .get(&full_key)
            .map(|entry| (entry.value.clone(), is_expired(entry.expires_at)));

        match cached {
            Some((value, false)) => {
                self.record(|s| {
                    s.hits += 1;
                    s.memory_hits += 1;
                })
                .await;
                return Some(value);
            }
            Some((_, true)) => {
                self.memory.write().await.remove(&full_key);
            }
            None => {}
        }

        if let Some(backend) = &self.backend {
            match backend.get(&full_key).await {
                Ok(Some(entry)) => match serde_json::from_str::<Value>(&entry.payload) {
                    Ok(value) => {
                        // Promoted entries expire with the backend entry
                        self.memory.write().await.insert(
                            full_key,
                            MemoryEntry {
                                value: value.clone(),
                                expires_at: entry.expires_at,
                            },
                        );
                        self.record(|s| {
                            s.hits += 1;
                            s.backend_hits += 1;
                        })
                        .await;
                        return Some(value);
                    }
                    Err(e) => warn!("Discarding undecodable {} cache entry: {}", backend.name(), e),
                },
                Ok(None) => {}
                Err(e) => warn!("{} cache read failed: {}", backend.name(), e),
            }
        }

        self.record(|s| s.misses += 1).await;
        None
    }

    /// Store a value in both tiers.
    ///
    /// Returns whether the backend accepted it; `true` without a backend.
    pub async fn set(&self, key: &str, value: &Value, group: &str, ttl: u64) -> bool {
        let full_key = Self::build_key(key, group);
        self.memory.write().await.insert(
            full_key.clone(),
            MemoryEntry {
                value: value.clone(),
                expires_at: expiry(ttl),
            },
        );
        self.record(|s| s.sets += 1).await;

        let Some(backend) = &self.backend else {
            return true;
        };

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode cache value: {}", e);
                return false;
            }
        };
        match backend.set(&full_key, &payload, ttl).await {
            Ok(()) => true,
            Err(e) => {
                warn!("{} cache write failed: {}", backend.name(), e);
                false
            }
        }
    }

    /// Remove a key from both tiers
    pub async fn delete(&self, key: &str, group: &str) -> bool {
        let full_key = Self::build_key(key, group);
        self.memory.write().await.remove(&full_key);
        self.record(|s| s.deletes += 1).await;

        match &self.backend {
            Some(backend) => match backend.delete(&full_key).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("{} cache delete failed: {}", backend.name(), e);
                    false
                }
            },
            None => true,
        }
    }

    /// Drop a group's entries, or everything when `group` is `None`
    pub async fn flush(&self, group: Option<&str>) -> bool {
        {
            let mut memory = self.memory.write().await;
            match group {
                Some(group) => {
                    let prefix = format!("{}:", group);
                    memory.retain(|key, _| !key.starts_with(&prefix));
                }
                None => memory.clear(),
            }
        }
        debug!("Flushed memory cache for {:?}", group);

        match &self.backend {
            Some(backend) => match backend.flush(group).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("{} cache flush failed: {}", backend.name(), e);
                    false
                }
            },
            None => true,
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// Log statistics
    pub async fn log_stats(&self) {
        if !self.enable_stats {
            warn!("Cache statistics not enabled");
            return;
        }
        let stats = self.stats().await;
        info!(
            "Cache hits: {} (memory {}, backend {}), misses: {}, hit rate: {:.2}%",
            stats.hits,
            stats.memory_hits,
            stats.backend_hits,
            stats.misses,
            stats.hit_rate() * 100.0
        );
    }
}

impl Default for CacheLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ttl_zero_served_from_memory() {
        let cache = CacheLayer::new();
        assert!(cache.set("price", &Value::Number(1.0), "pricing", 0).await);
        assert_eq!(cache.get("price", "pricing").await, Some(Value::Number(1.0)));

        let stats = cache.stats().await;
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.sets, 1);
    }

    #[tokio::test]
    async fn test_backend_hit_is_promoted() {
        let backend = ObjectCacheDriver::new();
        let writer = CacheLayer::new().with_backend(Arc::new(backend.handle()));
        writer.set("title", &Value::from("Hello"), "posts", 60).await;

        let reader = CacheLayer::new().with_backend(Arc::new(backend));
        assert_eq!(reader.get("title", "posts").await, Some(Value::from("Hello")));
        assert_eq!(reader.get("title", "posts").await, Some(Value::from("Hello")));

        let stats = reader.stats().await;
        assert_eq!(stats.backend_hits, 1);
        assert_eq!(stats.memory_hits, 1);
    }

    #[tokio::test]
    async fn test_promoted_entry_keeps_backend_expiry() {
        let backend = ObjectCacheDriver::new();
        let writer = CacheLayer::new().with_backend(Arc::new(backend.handle()));
        writer.set("k", &Value::from("v"), "g", 2).await;

        let reader = CacheLayer::new().with_backend(Arc::new(backend.handle()));
        assert_eq!(reader.get("k", "g").await, Some(Value::from("v")));

        tokio::time::sleep(std::time::Duration::from_millis(3100)).await;
        assert_eq!(backend.get(&CacheLayer::build_key("k", "g")).await.unwrap(), None);
        assert_eq!(reader.get("k", "g").await, None);
    }

    #[tokio::test]
    async fn test_promoted_entry_without_ttl_never_expires() {
        let backend = ObjectCacheDriver::new();
        backend
            .set(&CacheLayer::build_key("k", "g"), "1.0", 0)
            .await
            .unwrap();

        let reader = CacheLayer::new().with_backend(Arc::new(backend));
        assert_eq!(reader.get("k", "g").await, Some(Value::Number(1.0)));
        assert_eq!(reader.memory.read().await.values().next().and_then(|e| e.expires_at), None);
    }

    #[tokio::test]
    async fn test_flush_is_group_scoped() {
        let cache = CacheLayer::new().with_backend(Arc::new(ObjectCacheDriver::new()));
        cache.set("a", &Value::from(1.0), "one", 0).await;
        cache.set("b", &Value::from(2.0), "two", 0).await;

        assert!(cache.flush(Some("one")).await);
        assert_eq!(cache.get("a", "one").await, None);
        assert_eq!(cache.get("b", "two").await, Some(Value::from(2.0)));

        cache.flush(None).await;
        assert_eq!(cache.get("b", "two").await, None);
    }

    #[tokio::test]
    async fn test_miss_and_delete() {
        let cache = CacheLayer::new();
        assert_eq!(cache.get("missing", "g").await, None);
        cache.set("k", &Value::Bool(true), "g", 0).await;
        cache.delete("k", "g").await;
        assert_eq!(cache.get("k", "g").await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_key_shape() {
        let key = CacheLayer::build_key("price", "pricing");
        assert!(key.starts_with("pricing:"));
        assert_eq!(key.len(), "pricing:".len() + 64);
        assert_eq!(key_group(&key), "pricing");
    }
}
