//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use firesync_core::SyncError;
use serde_json::json;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid webhook signature")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("No user mapped to billing customer {0}")]
    UnresolvedMapping(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::UnresolvedMapping(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNRESOLVED_MAPPING",
                self.to_string(),
            ),
            ApiError::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Unauthenticated => ApiError::Unauthorized,
            SyncError::MalformedEvent(msg) => ApiError::BadRequest(msg),
            SyncError::UnresolvedMapping(customer_id) => ApiError::UnresolvedMapping(customer_id),
            SyncError::Store(msg)
            | SyncError::Billing(msg)
            | SyncError::Identity(msg)
            | SyncError::Config(msg) => {
                tracing::error!(error = %msg, "synchronization failure");
                ApiError::Internal
            }
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
