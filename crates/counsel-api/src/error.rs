//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.
//! Only NotFound / BadRequest / Unauthorized / Forbidden / UpstreamTimeout
//! reach clients as distinguishable codes; everything else collapses to a
//! generic internal error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use counsel_chat::ChatError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid parameters.
    BadRequest(String),
    /// 401 Unauthorized - missing, expired, or invalid credential.
    Unauthorized(String),
    /// 403 Forbidden - sharing disabled or link not currently active.
    Forbidden(String),
    /// 404 Not Found - resource absent or not owned by the caller.
    NotFound(String),
    /// 504 Gateway Timeout - the AI backend exceeded its deadline.
    UpstreamTimeout(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::UpstreamTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::ConversationNotFound
            | ChatError::DocumentNotFound
            | ChatError::LinkNotFound => ApiError::NotFound(err.to_string()),
            ChatError::LinkForbidden(_) => ApiError::Forbidden(err.to_string()),
            ChatError::Validation(_) => ApiError::BadRequest(err.to_string()),
            ChatError::UpstreamTimeout => ApiError::UpstreamTimeout(err.to_string()),
            ChatError::Upstream(_) | ChatError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<counsel_core::error::CounselError> for ApiError {
    fn from(err: counsel_core::error::CounselError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
