//! Redis cache driver

use super::{now_secs, CacheDriver, CachedPayload};
use crate::error::{Result, RuntimeError};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

const KEY_PREFIX: &str = "yap";

pub struct RedisDriver {
    conn: ConnectionManager,
}

impl RedisDriver {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| RuntimeError::Cache(format!("Failed to create Redis client: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| RuntimeError::Cache(format!("Failed to connect to Redis: {}", e)))?;

        info!("Connected to Redis cache at {}", url);
        Ok(Self { conn })
    }

    fn redis_key(key: &str) -> String {
        format!("{}:{}", KEY_PREFIX, key)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut iter = conn
            .scan_match::<_, String>(pattern)
            .await
            .map_err(redis_error)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}

fn redis_error(err: redis::RedisError) -> RuntimeError {
    RuntimeError::Cache(format!("Redis error: {}", err))
}

#[async_trait::async_trait]
impl CacheDriver for RedisDriver {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<CachedPayload>> {
        let mut conn = self.conn.clone();
        let redis_key = Self::redis_key(key);
        let (payload, ttl): (Option<String>, i64) = redis::pipe()
            .get(&redis_key)
            .ttl(&redis_key)
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        // TTL is -1 for persistent keys and -2 for missing ones
        let expires_at = (ttl > 0).then(|| now_secs() + ttl as u64);
        Ok(payload.map(|payload| CachedPayload::new(payload, expires_at)))
    }

    async fn set(&self, key: &str, payload: &str, ttl: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let redis_key = Self::redis_key(key);
        let result = if ttl == 0 {
            conn.set::<_, _, ()>(&redis_key, payload).await
        } else {
            conn.set_ex::<_, _, ()>(&redis_key, payload, ttl).await
        };
        result.map_err(redis_error)?;

        debug!("Set Redis key {} with TTL {}s", redis_key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::redis_key(key))
            .await
            .map_err(redis_error)
    }

    async fn flush(&self, group: Option<&str>) -> Result<()> {
        let pattern = match group {
            Some(group) => format!("{}:{}:*", KEY_PREFIX, group),
            None => format!("{}:*", KEY_PREFIX),
        };

        let keys = self.scan(&pattern).await?;
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&keys).await.map_err(redis_error)?;
        debug!("Flushed {} Redis keys matching {}", keys.len(), pattern);
        Ok(())
    }
}
