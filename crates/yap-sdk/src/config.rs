//! Configuration types for FieldEngine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where field groups and values are stored
    pub storage: StorageConfig,

    /// Backend tier of the cache
    pub cache: CacheConfig,

    /// Directory of group documents imported by `sync_from_directory`
    pub sync_dir: Option<PathBuf>,

    /// Currency suffix of price-formatted computed fields that name none
    pub default_currency: String,

    /// Base URL image fields returning URLs are resolved against
    pub uploads_url: Option<String>,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            sync_dir: None,
            default_currency: "USD".to_string(),
            uploads_url: None,
        }
    }

    /// Set storage configuration
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Set cache configuration
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_sync_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sync_dir = Some(dir.into());
        self
    }

    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    pub fn with_uploads_url(mut self, url: impl Into<String>) -> Self {
        self.uploads_url = Some(url.into());
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage type
    #[serde(default)]
    pub storage_type: StorageType,

    /// Connection string, required for SQLite
    #[serde(default)]
    pub connection: Option<String>,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn sqlite(url: impl Into<String>) -> Self {
        Self {
            storage_type: StorageType::Sqlite,
            connection: Some(url.into()),
        }
    }
}

/// Storage type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-process storage, lost on exit
    #[default]
    Memory,
    /// SQLite database (feature `sqlx`)
    Sqlite,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Redis URL or cache directory, depending on the backend
    pub connection: Option<String>,

    /// TTL of cached field values in seconds, 0 never expires
    pub default_ttl: u64,

    /// Collect hit/miss statistics
    pub enable_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::None,
            connection: None,
            default_ttl: 3600,
            enable_stats: true,
        }
    }
}

impl CacheConfig {
    pub fn with_backend(mut self, backend: CacheBackend, connection: Option<String>) -> Self {
        self.backend = backend;
        self.connection = connection;
        self
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.default_ttl = ttl;
        self
    }
}

/// Backend behind the memory tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Memory tier only
    #[default]
    None,
    /// Shared in-process object cache
    Object,
    /// JSON files under a directory
    File,
    /// Redis (feature `redis`)
    Redis,
}
