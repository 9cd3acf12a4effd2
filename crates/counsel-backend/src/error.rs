//! Error types for the AI backend collaborator.

/// Errors from the inference backend.
///
/// `Timeout` is kept distinct from other transport failures because the
/// remote service cold-starts: callers surface it as a user-actionable
/// "try again shortly" condition rather than a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("the AI service did not respond before the deadline")]
    Timeout,
    #[error("backend request failed: {0}")]
    Request(String),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Request(err.to_string())
        }
    }
}
