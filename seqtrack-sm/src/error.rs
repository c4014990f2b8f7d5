//! Error types for seqtrack-sm

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use seqtrack_common::{Error as CommonError, MutationError};
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. illegal step transition
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// seqtrack-common error
    #[error("Common error: {0}")]
    Common(#[from] CommonError),
}

impl From<MutationError> for ApiError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::NotFound(msg) => ApiError::NotFound(msg),
            MutationError::Conflict(msg) => ApiError::Conflict(msg),
            MutationError::Invalid(msg) => ApiError::BadRequest(msg),
            MutationError::Server(msg) | MutationError::Transport(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => match err {
                CommonError::Validation { .. } => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
                }
                CommonError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                CommonError::State(ref state) => {
                    (StatusCode::CONFLICT, "STATE_ERROR", state.to_string())
                }
                CommonError::Mutation(inner) => return ApiError::from(inner).into_response(),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    other.to_string(),
                ),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
