//! Application state shared across all route handlers.
//!
//! AppState holds the injected collaborators (database, cache, AI
//! backend) and the services built over them. It is passed to handlers
//! via axum's State extractor; all fields are `Arc` for cheap cloning
//! across handler tasks, and the backend/cache are trait objects so
//! tests can substitute doubles.

use std::sync::Arc;
use std::time::Instant;

use counsel_backend::AiBackend;
use counsel_cache::CacheStore;
use counsel_chat::{ConversationService, DocumentService, SharingService, TranslationService};
use counsel_core::config::CounselConfig;
use counsel_storage::{Database, UserRepository};

use crate::auth::AuthService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<CounselConfig>,
    /// SQLite database for persistent storage.
    pub database: Arc<Database>,
    /// Advisory key-value cache.
    pub cache: Arc<dyn CacheStore>,
    /// Conversation orchestration engine.
    pub conversations: Arc<ConversationService>,
    /// Public share-link subsystem.
    pub sharing: Arc<SharingService>,
    /// Translation proxy with history.
    pub translations: Arc<TranslationService>,
    /// Document generation proxy.
    pub documents: Arc<DocumentService>,
    /// User account repository (profile reads/updates).
    pub users: Arc<UserRepository>,
    /// Credential issuance and verification.
    pub auth: Arc<AuthService>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire up all services over the given collaborators.
    pub fn new(
        config: CounselConfig,
        database: Database,
        backend: Arc<dyn AiBackend>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let database = Arc::new(database);
        let conversations = Arc::new(ConversationService::new(
            Arc::clone(&database),
            Arc::clone(&backend),
            Arc::clone(&cache),
            &config.cache,
        ));
        let sharing = Arc::new(SharingService::new(Arc::clone(&database)));
        let translations = Arc::new(TranslationService::new(
            Arc::clone(&database),
            Arc::clone(&backend),
            Arc::clone(&cache),
            &config.cache,
        ));
        let documents = Arc::new(DocumentService::new(
            Arc::clone(&database),
            Arc::clone(&backend),
        ));
        let users = Arc::new(UserRepository::new(Arc::clone(&database)));
        let auth = Arc::new(AuthService::new(
            Arc::clone(&database),
            Arc::clone(&cache),
            config.auth.clone(),
        ));

        Self {
            config: Arc::new(config),
            database,
            cache,
            conversations,
            sharing,
            translations,
            documents,
            users,
            auth,
            start_time: Instant::now(),
        }
    }
}
