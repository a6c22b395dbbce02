//! Shared in-process object cache driver

use super::{expiry, is_expired, key_group, CacheDriver, CachedPayload};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Entries = HashMap<String, (String, Option<u64>)>;

/// Object cache shared by every handle cloned from it
pub struct ObjectCacheDriver {
    entries: Arc<RwLock<Entries>>,
}

impl ObjectCacheDriver {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Another driver over the same entries
    pub fn handle(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ObjectCacheDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CacheDriver for ObjectCacheDriver {
    fn name(&self) -> &str {
        "object"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedPayload>> {
        let found = self.entries.read().await.get(key).cloned();
        match found {
            Some((_, expires_at)) if is_expired(expires_at) => {
                self.entries.write().await.remove(key);
                Ok(None)
            }
            Some((payload, expires_at)) => Ok(Some(CachedPayload::new(payload, expires_at))),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, payload: &str, ttl: u64) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (payload.to_string(), expiry(ttl)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn flush(&self, group: Option<&str>) -> Result<()> {
        let mut entries = self.entries.write().await;
        match group {
            Some(group) => entries.retain(|key, _| key_group(key) != group),
            None => entries.clear(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handles_share_entries() {
        let driver = ObjectCacheDriver::new();
        let other = driver.handle();
        driver.set("g:1", "\"v\"", 0).await.unwrap();
        let entry = other.get("g:1").await.unwrap().unwrap();
        assert_eq!(entry.payload, "\"v\"");
        assert_eq!(entry.expires_at, None);
    }

    #[tokio::test]
    async fn test_get_reports_expiry() {
        let driver = ObjectCacheDriver::new();
        driver.set("g:1", "1", 60).await.unwrap();
        let expires_at = driver.get("g:1").await.unwrap().and_then(|e| e.expires_at);
        assert!(matches!(expires_at, Some(at) if at > crate::cache::now_secs()));
    }

    #[tokio::test]
    async fn test_group_flush() {
        let driver = ObjectCacheDriver::new();
        driver.set("a:1", "1", 0).await.unwrap();
        driver.set("b:1", "2", 0).await.unwrap();
        driver.flush(Some("a")).await.unwrap();
        assert_eq!(driver.len().await, 1);
        assert!(driver.get("b:1").await.unwrap().is_some());
    }
}
