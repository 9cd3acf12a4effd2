//! Counsel storage crate - SQLite persistence for the gateway.
//!
//! Provides a WAL-mode SQLite database with migrations and repository
//! implementations for users, refresh tokens, conversations, messages,
//! shared links, translations, and generated documents.

pub mod accounts;
pub mod db;
pub mod migrations;
pub mod records;
pub mod repository;

pub use accounts::{RefreshTokenRepository, StoredRefreshToken, UserRepository};
pub use db::Database;
pub use records::{DocumentRepository, TranslationRepository};
pub use repository::{ConversationRepository, MessageRepository, SharedLinkRepository};
