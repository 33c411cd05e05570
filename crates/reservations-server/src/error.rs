//! Error types for the reservations API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use reservations_core::StorageError;
use serde_json::json;

/// Request-level errors surfaced to API callers.
///
/// Read failures never appear here: the read endpoint absorbs them into an
/// empty list.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    /// Message placed in the response body; details stay in the logs.
    fn public_message(&self) -> &'static str {
        match self {
            ApiError::InvalidJson(_) => "Invalid JSON",
            ApiError::Storage(_) => "Storage unavailable",
            ApiError::MethodNotAllowed => "Method not allowed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.public_message();
        match self {
            ApiError::InvalidJson(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": message })),
            )
                .into_response(),
            ApiError::Storage(_) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "ok": false, "error": message })),
            )
                .into_response(),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "error": message })),
            )
                .into_response(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
