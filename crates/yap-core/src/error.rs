//! Error types for YAP Core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid group name: {0:?}")]
    InvalidGroupName(String),

    #[error("Invalid field definition: {0}")]
    InvalidField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
