//! Counsel core crate - configuration, errors, and domain types.
//!
//! Shared foundation for the Counsel gateway: the subsystem-wrapping
//! error type, TOML configuration, and the persistent domain records
//! (users, conversations, messages, shared links, translations, documents).

pub mod config;
pub mod error;
pub mod types;

pub use config::CounselConfig;
pub use error::{CounselError, Result};
pub use types::{
    Conversation, GeneratedDocument, Message, MessageMetadata, Mode, Provider, Role, SharedLink,
    ToolUsage, Translation, User,
};
