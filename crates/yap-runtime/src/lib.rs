//! YAP Runtime - Storage and resolution runtime for the YAP custom fields engine
//!
//! This crate provides the services behind the engine's read/write API:
//! storage backends, the schema registry, pattern and value stores,
//! repeater and flexible content, the hook pipeline, value-updated events,
//! the two-tier cache and computed fields.

pub mod cache;
pub mod computed;
pub mod content;
pub mod error;
pub mod events;
pub mod hooks;
pub mod pattern;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod values;

// Re-export main types
#[cfg(feature = "redis")]
pub use cache::RedisDriver;
pub use cache::{
    CacheDriver, CacheLayer, CacheStats, CachedPayload, FileDriver, ObjectCacheDriver,
};
pub use computed::{ComputeContext, ComputedFields, ComputedFormat, ComputedOptions};
pub use content::{
    FlexibleContent, KeyedLocks, RenderContext, RenderedSection, RepeaterService, RowChange, Section,
};
pub use error::{Result, RuntimeError};
pub use events::{CacheInvalidator, EventBus, FieldEventSubscriber, ValueUpdated};
pub use hooks::{HookContext, HookRegistry, HookScope, HookStage};
pub use pattern::PatternStore;
pub use pipeline::FieldPipeline;
pub use schema::SchemaRegistry;
#[cfg(feature = "sqlx")]
pub use store::SqliteStore;
pub use store::{FieldStore, MemoryStore};
pub use values::{AttachmentResolver, UploadsUrlResolver, ValueStore};
