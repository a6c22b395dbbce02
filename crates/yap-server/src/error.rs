//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use yap_sdk::{SdkError, ValidationFailure};

/// Server error type
#[derive(Debug)]
pub enum ServerError {
    /// A submitted value was rejected
    Validation(ValidationFailure),

    /// Invalid request, including malformed group documents
    InvalidRequest(String),

    /// Internal server error
    InternalError(String),

    /// Group or field not found
    NotFound(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Validation(failure) => write!(f, "Validation failed: {}", failure),
            ServerError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ServerError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ServerError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ServerError::Validation(failure) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": failure.message,
                    "field": failure.field,
                    "rule": failure.rule,
                    "status": StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                }),
            ),
            ServerError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, error_body(StatusCode::BAD_REQUEST, msg)),
            ServerError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(StatusCode::INTERNAL_SERVER_ERROR, msg),
            ),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(StatusCode::NOT_FOUND, msg)),
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(status: StatusCode, message: String) -> serde_json::Value {
    json!({
        "error": message,
        "status": status.as_u16(),
    })
}

impl From<SdkError> for ServerError {
    fn from(err: SdkError) -> Self {
        match err {
            SdkError::Validation(failure) => ServerError::Validation(failure),
            SdkError::NotFound(what) => ServerError::NotFound(what),
            SdkError::MalformedDocument(msg) => ServerError::InvalidRequest(msg),
            other => ServerError::InternalError(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::InternalError(err.to_string())
    }
}
