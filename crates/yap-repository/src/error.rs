//! Error types for the repository layer

use std::path::PathBuf;
use thiserror::Error;
use yap_core::CoreError;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur during repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// No document for the group
    #[error("Group document not found: {group}")]
    NotFound { group: String },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON document
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML document
    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Well-formed document describing an invalid group
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Invalid path provided
    #[error("Invalid path: {path}")]
    InvalidPath { path: PathBuf },

    /// Generic error
    #[error("Repository error: {0}")]
    Other(String),
}

impl From<CoreError> for RepositoryError {
    fn from(err: CoreError) -> Self {
        RepositoryError::InvalidDocument(err.to_string())
    }
}
