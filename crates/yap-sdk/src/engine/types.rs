//! Types returned by FieldEngine

use serde::{Deserialize, Serialize};
use yap_core::FieldEntry;
use yap_repository::SyncStatus;

/// Outcome of importing one group document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub group: String,

    /// Definitions written, sub fields included
    pub fields_imported: usize,

    /// How the document compared to the group before the import
    pub status: SyncStatus,
}

/// Values of one group applicable to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupValues {
    pub group: String,
    pub title: String,
    pub fields: Vec<FieldEntry>,
}
