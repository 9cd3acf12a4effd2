use thiserror::Error;

/// Top-level error type for the Counsel gateway.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for CounselError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CounselError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CounselError {
    fn from(err: toml::de::Error) -> Self {
        CounselError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CounselError {
    fn from(err: toml::ser::Error) -> Self {
        CounselError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CounselError {
    fn from(err: serde_json::Error) -> Self {
        CounselError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Counsel operations.
pub type Result<T> = std::result::Result<T, CounselError>;
