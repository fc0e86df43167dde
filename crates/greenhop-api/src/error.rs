//! API error handling.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use greenhop_store::StoreError;
use serde_json::json;

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<greenhop_core::Error> for ApiError {
    fn from(err: greenhop_core::Error) -> Self {
        match err {
            greenhop_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            greenhop_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            greenhop_core::Error::Conflict(msg) | greenhop_core::Error::InvalidTransition(msg) => {
                ApiError::Conflict(msg)
            }
            greenhop_core::Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        greenhop_core::Error::from(err).into()
    }
}

/// Malformed bodies are validation failures like any other.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
