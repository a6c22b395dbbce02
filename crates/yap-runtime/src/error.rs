//! Runtime error types

use thiserror::Error;
use yap_core::{CoreError, ValidationFailure};

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Storage driver failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// A group's tables do not exist
    #[error("Table not found: {0}")]
    TableMissing(String),

    /// Field not found in its group
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// A value was rejected by validation; nothing was persisted
    #[error("Validation failed: {0}")]
    Validation(ValidationFailure),

    /// JSON document or JSON-typed value could not be decoded
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Computed field registration would introduce a cycle
    #[error("Dependency cycle: {0}")]
    DependencyCycle(String),

    /// Cache backend failure
    #[error("Cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::MalformedJson(err.to_string())
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for RuntimeError {
    fn from(err: sqlx::Error) -> Self {
        RuntimeError::Storage(err.to_string())
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
