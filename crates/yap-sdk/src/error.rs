//! SDK error types

use thiserror::Error;
use yap_core::{CoreError, ValidationFailure};
use yap_repository::RepositoryError;
use yap_runtime::RuntimeError;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A value was rejected; nothing was persisted
    #[error("Validation failed: {0}")]
    Validation(ValidationFailure),

    /// Group or field not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed group document or JSON value
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Storage refused an operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(RuntimeError),

    /// Repository error
    #[error("Repository error: {0}")]
    RepositoryError(RepositoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<RuntimeError> for SdkError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Validation(failure) => SdkError::Validation(failure),
            RuntimeError::FieldNotFound(name) => SdkError::NotFound(name),
            RuntimeError::MalformedJson(msg) => SdkError::MalformedDocument(msg),
            other => SdkError::RuntimeError(other),
        }
    }
}

impl From<RepositoryError> for SdkError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Json(e) => SdkError::MalformedDocument(e.to_string()),
            RepositoryError::YamlParse(e) => SdkError::MalformedDocument(e.to_string()),
            RepositoryError::InvalidDocument(msg) => SdkError::MalformedDocument(msg),
            RepositoryError::NotFound { group } => SdkError::NotFound(group),
            other => SdkError::RepositoryError(other),
        }
    }
}

impl From<CoreError> for SdkError {
    fn from(err: CoreError) -> Self {
        SdkError::NotFound(err.to_string())
    }
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
