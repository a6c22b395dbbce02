//! Repository trait definitions

use crate::document::GroupDocument;
use crate::error::RepositoryResult;
use async_trait::async_trait;

/// Source of field group documents
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Load one group's document
    async fn load(&self, group: &str) -> RepositoryResult<GroupDocument>;

    /// Load every readable document. Unreadable documents are skipped.
    async fn load_all(&self) -> RepositoryResult<Vec<GroupDocument>>;

    /// Check whether a group has a document
    async fn exists(&self, group: &str) -> bool;

    /// Write a group's document, replacing any previous one
    async fn save(&self, document: &GroupDocument) -> RepositoryResult<()>;
}
