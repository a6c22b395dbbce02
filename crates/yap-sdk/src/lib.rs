//! YAP Custom Fields SDK
//!
//! High-level API for registering field groups and reading and writing
//! their values.
//!
//! ```rust,ignore
//! use yap_sdk::{FieldEngineBuilder, PostContext};
//!
//! let engine = FieldEngineBuilder::new().with_default_currency("PLN").build().await?;
//! engine.import_group_json(&std::fs::read_to_string("pricing.json")?).await?;
//!
//! engine.update_field("pricing", "base_price", 100.0, 42).await?;
//! let groups = engine.get_fields_for_post(&PostContext::new(42, "product")).await;
//! ```

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;

// Re-export main types
pub use builder::FieldEngineBuilder;
pub use config::{CacheBackend, CacheConfig, EngineConfig, StorageConfig, StorageType};
pub use engine::{FieldEngine, GroupValues, ImportReport};
pub use error::{Result, SdkError};

// Re-export commonly used types from dependencies
pub use yap_core::{
    FieldDefinition, FieldEntry, FieldType, GroupMeta, GroupName, LayoutDefinition, PostContext,
    ValidationFailure, Value,
};
pub use yap_repository::{GroupDocument, SyncStatus};
pub use yap_runtime::{
    CacheStats, ComputeContext, ComputedFormat, ComputedOptions, FieldEventSubscriber,
    HookContext, HookScope, HookStage, RenderContext, RenderedSection, Section, ValueUpdated,
};
