//! Database schema migrations.
//!
//! Applies the initial schema: users, refresh_tokens, conversations,
//! messages, shared_links, translations, documents, and the
//! schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use counsel_core::error::CounselError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future migrations
/// can be added by checking the current version and applying incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), CounselError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| CounselError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CounselError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), CounselError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            password_hash   TEXT,
            name            TEXT NOT NULL DEFAULT '',
            avatar          TEXT,
            provider        TEXT NOT NULL DEFAULT 'LOCAL'
                            CHECK (provider IN ('LOCAL', 'GOOGLE')),
            share_enabled   INTEGER NOT NULL DEFAULT 1,
            last_login_at   INTEGER,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS refresh_tokens (
            id              TEXT PRIMARY KEY NOT NULL,
            user_id         TEXT NOT NULL,
            token           TEXT NOT NULL UNIQUE,
            expires_at      INTEGER NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user
            ON refresh_tokens (user_id);

        CREATE TABLE IF NOT EXISTS conversations (
            id              TEXT PRIMARY KEY NOT NULL,
            user_id         TEXT NOT NULL,
            title           TEXT NOT NULL DEFAULT '',
            mode            TEXT NOT NULL
                            CHECK (mode IN ('NORMAL', 'AGENTIC')),
            document_id     TEXT,
            document_name   TEXT,
            session_id      TEXT,
            is_shared       INTEGER NOT NULL DEFAULT 0,
            last_message_at INTEGER NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user_activity
            ON conversations (user_id, last_message_at DESC);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY NOT NULL,
            conversation_id TEXT NOT NULL,
            role            TEXT NOT NULL
                            CHECK (role IN ('USER', 'ASSISTANT')),
            content         TEXT NOT NULL DEFAULT '',
            attachments     TEXT NOT NULL DEFAULT '[]',
            metadata        TEXT,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages (conversation_id, created_at ASC);

        CREATE TABLE IF NOT EXISTS shared_links (
            id              TEXT PRIMARY KEY NOT NULL,
            token           TEXT NOT NULL UNIQUE,
            user_id         TEXT NOT NULL,
            conversation_id TEXT NOT NULL,
            view_count      INTEGER NOT NULL DEFAULT 0,
            max_views       INTEGER,
            expires_at      INTEGER,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_shared_links_conversation
            ON shared_links (conversation_id);

        CREATE TABLE IF NOT EXISTS translations (
            id              TEXT PRIMARY KEY NOT NULL,
            user_id         TEXT NOT NULL,
            source_text     TEXT NOT NULL,
            translated_text TEXT NOT NULL,
            source_lang     TEXT NOT NULL,
            target_lang     TEXT NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_translations_user
            ON translations (user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS documents (
            id              TEXT PRIMARY KEY NOT NULL,
            user_id         TEXT NOT NULL,
            title           TEXT NOT NULL DEFAULT '',
            content         TEXT NOT NULL DEFAULT '',
            format          TEXT NOT NULL DEFAULT 'pdf',
            file_url        TEXT,
            prompt          TEXT NOT NULL DEFAULT '',
            generated_by    TEXT NOT NULL DEFAULT '',
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_documents_user
            ON documents (user_id, created_at DESC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| CounselError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
