//! Custom request extractors
//!
//! JSON bodies that fail to parse are answered with the same error body as
//! every other rejected request.

use crate::error::ServerError;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};

/// JSON extractor rejecting with [`ServerError::InvalidRequest`]
pub struct JsonExtractor<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonExtractor<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ServerError::InvalidRequest(match rejection {
                JsonRejection::JsonDataError(err) => format!("Invalid JSON data: {}", err),
                JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
                JsonRejection::MissingJsonContentType(_) => {
                    "Missing 'Content-Type: application/json' header".to_string()
                }
                other => format!("Failed to parse JSON: {}", other),
            })),
        }
    }
}
