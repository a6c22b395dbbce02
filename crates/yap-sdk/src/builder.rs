//! Builder pattern for FieldEngine

use crate::config::{CacheBackend, CacheConfig, EngineConfig, StorageConfig, StorageType};
use crate::engine::FieldEngine;
use crate::error::{Result, SdkError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use yap_repository::FileSystemRepository;
use yap_runtime::{
    AttachmentResolver, CacheDriver, CacheInvalidator, CacheLayer, ComputedFields, EventBus,
    FieldEventSubscriber, FieldPipeline, FieldStore, FileDriver, FlexibleContent, HookRegistry,
    KeyedLocks, MemoryStore, ObjectCacheDriver, PatternStore, RepeaterService, SchemaRegistry,
    UploadsUrlResolver, ValueStore,
};

/// Builder for FieldEngine
///
/// # Example
///
/// ```rust,ignore
/// use yap_sdk::{FieldEngineBuilder, StorageConfig};
///
/// // In-memory engine for tests
/// let engine = FieldEngineBuilder::new().build().await?;
///
/// // SQLite storage with a file cache
/// let engine = FieldEngineBuilder::new()
///     .with_storage(StorageConfig::sqlite("sqlite://fields.db?mode=rwc"))
///     .with_file_cache("/var/cache/yap")
///     .with_default_currency("PLN")
///     .build()
///     .await?;
/// ```
pub struct FieldEngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn FieldStore>>,
    cache_driver: Option<Arc<dyn CacheDriver>>,
    attachments: Option<Arc<dyn AttachmentResolver>>,
    subscribers: Vec<Arc<dyn FieldEventSubscriber>>,
}

impl FieldEngineBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::from_config(EngineConfig::new())
    }

    /// Start from a loaded configuration
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            store: None,
            cache_driver: None,
            attachments: None,
            subscribers: Vec::new(),
        }
    }

    /// Set storage configuration
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Use an already constructed store instead of the configured one
    pub fn with_store(mut self, store: Arc<dyn FieldStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set cache configuration
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Cache backend tier in files under `dir`
    pub fn with_file_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache.backend = CacheBackend::File;
        self.config.cache.connection = Some(dir.into().to_string_lossy().to_string());
        self
    }

    /// Use an already constructed cache driver instead of the configured one
    pub fn with_cache_driver(mut self, driver: Arc<dyn CacheDriver>) -> Self {
        self.cache_driver = Some(driver);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: u64) -> Self {
        self.config.cache.default_ttl = ttl;
        self
    }

    /// Enable cache statistics
    pub fn enable_stats(mut self, enable: bool) -> Self {
        self.config.cache.enable_stats = enable;
        self
    }

    pub fn with_sync_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.sync_dir = Some(dir.into());
        self
    }

    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.config.default_currency = currency.into();
        self
    }

    /// Resolve image attachment ids through `resolver`
    pub fn with_attachments(mut self, resolver: Arc<dyn AttachmentResolver>) -> Self {
        self.attachments = Some(resolver);
        self
    }

    /// Subscribe to value updates after the built-in subscribers
    pub fn with_subscriber(mut self, subscriber: Arc<dyn FieldEventSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    async fn build_store(config: &StorageConfig) -> Result<Arc<dyn FieldStore>> {
        match config.storage_type {
            StorageType::Memory => Ok(Arc::new(MemoryStore::new())),
            #[cfg(feature = "sqlx")]
            StorageType::Sqlite => {
                let url = config.connection.as_deref().ok_or_else(|| {
                    SdkError::ConfigError("sqlite storage requires a connection URL".to_string())
                })?;
                Ok(Arc::new(yap_runtime::SqliteStore::connect(url).await?))
            }
            #[cfg(not(feature = "sqlx"))]
            StorageType::Sqlite => Err(SdkError::ConfigError(
                "sqlite storage requires the sqlx feature".to_string(),
            )),
        }
    }

    async fn build_cache_driver(config: &CacheConfig) -> Result<Option<Arc<dyn CacheDriver>>> {
        match config.backend {
            CacheBackend::None => Ok(None),
            CacheBackend::Object => Ok(Some(Arc::new(ObjectCacheDriver::new()))),
            CacheBackend::File => {
                let dir = config.connection.as_deref().ok_or_else(|| {
                    SdkError::ConfigError("file cache requires a directory".to_string())
                })?;
                Ok(Some(Arc::new(FileDriver::new(dir))))
            }
            #[cfg(feature = "redis")]
            CacheBackend::Redis => {
                let url = config.connection.as_deref().ok_or_else(|| {
                    SdkError::ConfigError("redis cache requires a connection URL".to_string())
                })?;
                Ok(Some(Arc::new(yap_runtime::RedisDriver::connect(url).await?)))
            }
            #[cfg(not(feature = "redis"))]
            CacheBackend::Redis => Err(SdkError::ConfigError(
                "redis cache requires the redis feature".to_string(),
            )),
        }
    }

    /// Construct every service once and wire them together
    pub async fn build(self) -> Result<FieldEngine> {
        let store = match self.store {
            Some(store) => store,
            None => Self::build_store(&self.config.storage).await?,
        };
        let driver = match self.cache_driver {
            Some(driver) => Some(driver),
            None => Self::build_cache_driver(&self.config.cache).await?,
        };

        let mut cache = CacheLayer::new().with_stats(self.config.cache.enable_stats);
        if let Some(driver) = driver {
            cache = cache.with_backend(driver);
        }
        let cache = Arc::new(cache);

        let patterns = Arc::new(PatternStore::new(store.clone()));
        let attachments = self.attachments.or_else(|| {
            self.config
                .uploads_url
                .clone()
                .map(|url| Arc::new(UploadsUrlResolver::new(url)) as Arc<dyn AttachmentResolver>)
        });
        let mut values = ValueStore::new(store.clone(), patterns.clone());
        if let Some(resolver) = attachments {
            values = values.with_attachments(resolver);
        }
        let values = Arc::new(values);

        let computed = Arc::new(
            ComputedFields::new(values.clone(), patterns.clone(), cache.clone())
                .with_default_currency(self.config.default_currency.clone()),
        );

        let events = Arc::new(EventBus::new());
        events
            .subscribe(Arc::new(CacheInvalidator::new(cache.clone())))
            .await;
        events.subscribe(computed.clone()).await;
        for subscriber in self.subscribers {
            events.subscribe(subscriber).await;
        }

        let hooks = Arc::new(HookRegistry::new());
        let pipeline = Arc::new(
            FieldPipeline::new(
                patterns.clone(),
                values.clone(),
                hooks.clone(),
                events.clone(),
                cache.clone(),
            )
            .with_cache_ttl(self.config.cache.default_ttl),
        );

        let repeaters = Arc::new(RepeaterService::new(
            store.clone(),
            patterns.clone(),
            values.clone(),
            Arc::new(KeyedLocks::new()),
        ));
        let flexible = Arc::new(FlexibleContent::new(store.clone(), repeaters.clone()));
        let schema = Arc::new(SchemaRegistry::new(store.clone(), patterns.clone()));

        let sync = match &self.config.sync_dir {
            Some(dir) => Some(FileSystemRepository::create(dir).await?),
            None => None,
        };

        info!(
            "Field engine ready (storage: {:?}, cache backend: {})",
            self.config.storage.storage_type,
            cache.backend_name().unwrap_or("none")
        );

        Ok(FieldEngine {
            config: self.config,
            store,
            schema,
            patterns,
            values,
            hooks,
            cache,
            events,
            computed,
            repeaters,
            flexible,
            pipeline,
            sync,
        })
    }
}

impl Default for FieldEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
