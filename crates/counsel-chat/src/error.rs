//! Error types for the conversation engine.
//!
//! Only NotFound / Validation / Forbidden / UpstreamTimeout cross the core
//! boundary as distinguishable failures. Cache errors are absorbed at the
//! point of use, and malformed upstream replies degrade to placeholder
//! text inside the normalizer rather than surfacing here.

use counsel_backend::BackendError;
use counsel_core::error::CounselError;

/// Errors from the conversation, sharing, translation, and document services.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("conversation not found")]
    ConversationNotFound,
    #[error("document not found")]
    DocumentNotFound,
    #[error("shared link not found")]
    LinkNotFound,
    /// The link exists but is not currently honorable; the reason says why.
    #[error("shared link is not available: {0}")]
    LinkForbidden(String),
    #[error("validation failed: {0}")]
    Validation(String),
    /// The AI service exceeded its deadline, most likely a cold start.
    #[error("the AI service is taking longer than expected; it may be waking up - try again shortly")]
    UpstreamTimeout,
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<CounselError> for ChatError {
    fn from(err: CounselError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<BackendError> for ChatError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Timeout => ChatError::UpstreamTimeout,
            other => ChatError::Upstream(other.to_string()),
        }
    }
}
