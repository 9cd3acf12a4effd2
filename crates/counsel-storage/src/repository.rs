//! Repository implementations for conversation-domain persistence.
//!
//! Provides ConversationRepository, MessageRepository, and
//! SharedLinkRepository operating on the Database struct with raw SQL.
//! Every conversation read/write is scoped by (id, user_id) so one user
//! can never observe another user's data.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use counsel_core::error::CounselError;
use counsel_core::types::{Conversation, Message, MessageMetadata, Mode, Role, SharedLink};

use crate::db::Database;

// =============================================================================
// Row-mapping helpers (shared with the other repository modules)
// =============================================================================

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, CounselError> {
    Uuid::parse_str(s).map_err(|e| CounselError::Storage(format!("Invalid uuid in row: {}", e)))
}

pub(crate) fn from_epoch(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub(crate) fn opt_from_epoch(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.map(from_epoch)
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> Result<Conversation, CounselError> {
    let storage = |e: rusqlite::Error| CounselError::Storage(e.to_string());
    let mode_str: String = row.get(3).map_err(storage)?;
    Ok(Conversation {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage)?)?,
        user_id: parse_uuid(&row.get::<_, String>(1).map_err(storage)?)?,
        title: row.get(2).map_err(storage)?,
        mode: Mode::parse(&mode_str)
            .ok_or_else(|| CounselError::Storage(format!("Unknown mode in row: {}", mode_str)))?,
        document_id: row.get(4).map_err(storage)?,
        document_name: row.get(5).map_err(storage)?,
        session_id: row.get(6).map_err(storage)?,
        is_shared: row.get::<_, i64>(7).map_err(storage)? != 0,
        last_message_at: from_epoch(row.get(8).map_err(storage)?),
        created_at: from_epoch(row.get(9).map_err(storage)?),
        updated_at: from_epoch(row.get(10).map_err(storage)?),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, CounselError> {
    let storage = |e: rusqlite::Error| CounselError::Storage(e.to_string());
    let role_str: String = row.get(2).map_err(storage)?;
    let attachments_json: String = row.get(4).map_err(storage)?;
    let metadata_json: Option<String> = row.get(5).map_err(storage)?;

    let attachments: Vec<String> = serde_json::from_str(&attachments_json)
        .map_err(|e| CounselError::Storage(format!("Invalid attachments json: {}", e)))?;
    let metadata: Option<MessageMetadata> = match metadata_json {
        Some(json) => Some(
            serde_json::from_str(&json)
                .map_err(|e| CounselError::Storage(format!("Invalid metadata json: {}", e)))?,
        ),
        None => None,
    };

    Ok(Message {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage)?)?,
        conversation_id: parse_uuid(&row.get::<_, String>(1).map_err(storage)?)?,
        role: Role::parse(&role_str)
            .ok_or_else(|| CounselError::Storage(format!("Unknown role in row: {}", role_str)))?,
        content: row.get(3).map_err(storage)?,
        attachments,
        metadata,
        created_at: from_epoch(row.get(6).map_err(storage)?),
    })
}

fn row_to_shared_link(row: &rusqlite::Row<'_>) -> Result<SharedLink, CounselError> {
    let storage = |e: rusqlite::Error| CounselError::Storage(e.to_string());
    Ok(SharedLink {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage)?)?,
        token: row.get(1).map_err(storage)?,
        user_id: parse_uuid(&row.get::<_, String>(2).map_err(storage)?)?,
        conversation_id: parse_uuid(&row.get::<_, String>(3).map_err(storage)?)?,
        view_count: row.get::<_, i64>(4).map_err(storage)? as u64,
        max_views: row.get::<_, Option<i64>>(5).map_err(storage)?.map(|v| v as u64),
        expires_at: opt_from_epoch(row.get(6).map_err(storage)?),
        created_at: from_epoch(row.get(7).map_err(storage)?),
    })
}

const CONVERSATION_COLUMNS: &str = "id, user_id, title, mode, document_id, document_name, \
     session_id, is_shared, last_message_at, created_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, role, content, attachments, metadata, created_at";

const SHARED_LINK_COLUMNS: &str =
    "id, token, user_id, conversation_id, view_count, max_views, expires_at, created_at";

// =============================================================================
// ConversationRepository
// =============================================================================

/// Repository for conversation records.
pub struct ConversationRepository {
    db: Arc<Database>,
}

impl ConversationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new conversation.
    pub fn insert(&self, conversation: &Conversation) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, title, mode, document_id, document_name,
                                            session_id, is_shared, last_message_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    conversation.id.to_string(),
                    conversation.user_id.to_string(),
                    conversation.title,
                    conversation.mode.as_str(),
                    conversation.document_id,
                    conversation.document_name,
                    conversation.session_id,
                    conversation.is_shared as i32,
                    conversation.last_message_at.timestamp(),
                    conversation.created_at.timestamp(),
                    conversation.updated_at.timestamp(),
                ],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to insert conversation: {}", e)))?;
            Ok(())
        })
    }

    /// Find a conversation owned by the given user.
    pub fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Conversation>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM conversations WHERE id = ?1 AND user_id = ?2",
                    CONVERSATION_COLUMNS
                ))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(
                    rusqlite::params![id.to_string(), user_id.to_string()],
                    |row| Ok(row_to_conversation(row)),
                )
                .optional()
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            match result {
                Some(conversation) => Ok(Some(conversation?)),
                None => Ok(None),
            }
        })
    }

    /// Find a conversation without an ownership filter.
    ///
    /// Only the public share-resolution path uses this; everything else
    /// must go through `find_for_user`.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM conversations WHERE id = ?1",
                    CONVERSATION_COLUMNS
                ))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id.to_string()], |row| {
                    Ok(row_to_conversation(row))
                })
                .optional()
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            match result {
                Some(conversation) => Ok(Some(conversation?)),
                None => Ok(None),
            }
        })
    }

    /// List a user's conversations, most recently active first.
    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM conversations WHERE user_id = ?1
                     ORDER BY last_message_at DESC, rowid DESC",
                    CONVERSATION_COLUMNS
                ))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string()], |row| {
                    Ok(row_to_conversation(row))
                })
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let mut conversations = Vec::new();
            for row in rows {
                conversations.push(row.map_err(|e| CounselError::Storage(e.to_string()))??);
            }
            Ok(conversations)
        })
    }

    /// Persist newly issued affinity tokens onto a conversation.
    ///
    /// `document` carries (document_id, document_name) when the backend
    /// assigned a fresh document; `session_id` overwrites any prior value.
    /// Passing neither is a no-op.
    pub fn update_affinity(
        &self,
        id: Uuid,
        document: Option<(&str, &str)>,
        session_id: Option<&str>,
    ) -> Result<(), CounselError> {
        if document.is_none() && session_id.is_none() {
            return Ok(());
        }
        self.db.with_conn(|conn| {
            let now = Utc::now().timestamp();
            match (document, session_id) {
                (Some((doc_id, doc_name)), Some(session)) => conn.execute(
                    "UPDATE conversations
                     SET document_id = ?2, document_name = ?3, session_id = ?4, updated_at = ?5
                     WHERE id = ?1",
                    rusqlite::params![id.to_string(), doc_id, doc_name, session, now],
                ),
                (Some((doc_id, doc_name)), None) => conn.execute(
                    "UPDATE conversations
                     SET document_id = ?2, document_name = ?3, updated_at = ?4
                     WHERE id = ?1",
                    rusqlite::params![id.to_string(), doc_id, doc_name, now],
                ),
                (None, Some(session)) => conn.execute(
                    "UPDATE conversations SET session_id = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![id.to_string(), session, now],
                ),
                (None, None) => unreachable!("checked above"),
            }
            .map_err(|e| CounselError::Storage(format!("Failed to update affinity: {}", e)))?;
            Ok(())
        })
    }

    /// Refresh the last-activity timestamp.
    pub fn touch_last_message(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET last_message_at = ?2, updated_at = ?2 WHERE id = ?1",
                rusqlite::params![id.to_string(), at.timestamp()],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to touch conversation: {}", e)))?;
            Ok(())
        })
    }

    /// Flip the sharing flag.
    pub fn set_shared(&self, id: Uuid, shared: bool) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET is_shared = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id.to_string(), shared as i32, Utc::now().timestamp()],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to set shared flag: {}", e)))?;
            Ok(())
        })
    }

    /// Ownership-checked hard delete. Returns true when a row was removed.
    /// Messages and shared links cascade at the schema level.
    pub fn delete_for_user(&self, id: Uuid, user_id: Uuid) -> Result<bool, CounselError> {
        self.db.with_conn(|conn| {
            let affected = conn
                .execute(
                    "DELETE FROM conversations WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![id.to_string(), user_id.to_string()],
                )
                .map_err(|e| {
                    CounselError::Storage(format!("Failed to delete conversation: {}", e))
                })?;
            Ok(affected > 0)
        })
    }

    /// Delete every conversation a user owns. Returns the number removed.
    pub fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, CounselError> {
        self.db.with_conn(|conn| {
            let affected = conn
                .execute(
                    "DELETE FROM conversations WHERE user_id = ?1",
                    rusqlite::params![user_id.to_string()],
                )
                .map_err(|e| {
                    CounselError::Storage(format!("Failed to delete conversations: {}", e))
                })?;
            Ok(affected as u64)
        })
    }
}

// =============================================================================
// MessageRepository
// =============================================================================

/// Repository for message records. Messages are append-only.
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a message.
    pub fn insert(&self, message: &Message) -> Result<(), CounselError> {
        let attachments = serde_json::to_string(&message.attachments)?;
        let metadata = match &message.metadata {
            Some(meta) => Some(serde_json::to_string(meta)?),
            None => None,
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content, attachments, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    message.id.to_string(),
                    message.conversation_id.to_string(),
                    message.role.as_str(),
                    message.content,
                    attachments,
                    metadata,
                    message.created_at.timestamp(),
                ],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to insert message: {}", e)))?;
            Ok(())
        })
    }

    /// Full message history, oldest first.
    pub fn list_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM messages WHERE conversation_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                    MESSAGE_COLUMNS
                ))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![conversation_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row.map_err(|e| CounselError::Storage(e.to_string()))??);
            }
            Ok(messages)
        })
    }

    /// The most recent `limit` messages, returned oldest first.
    ///
    /// This is the bounded context window handed to the AI backend.
    pub fn recent_window(
        &self,
        conversation_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Message>, CounselError> {
        let mut messages = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM messages WHERE conversation_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?2",
                    MESSAGE_COLUMNS
                ))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![conversation_id.to_string(), limit],
                    |row| Ok(row_to_message(row)),
                )
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| CounselError::Storage(e.to_string()))??);
            }
            Ok(out)
        })?;
        messages.reverse();
        Ok(messages)
    }

    /// The single newest message, if any.
    pub fn latest_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Option<Message>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM messages WHERE conversation_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1",
                    MESSAGE_COLUMNS
                ))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![conversation_id.to_string()], |row| {
                    Ok(row_to_message(row))
                })
                .optional()
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            match result {
                Some(message) => Ok(Some(message?)),
                None => Ok(None),
            }
        })
    }
}

// =============================================================================
// SharedLinkRepository
// =============================================================================

/// Repository for public share links.
pub struct SharedLinkRepository {
    db: Arc<Database>,
}

impl SharedLinkRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new share link.
    pub fn insert(&self, link: &SharedLink) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO shared_links (id, token, user_id, conversation_id, view_count,
                                           max_views, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    link.id.to_string(),
                    link.token,
                    link.user_id.to_string(),
                    link.conversation_id.to_string(),
                    link.view_count as i64,
                    link.max_views.map(|v| v as i64),
                    link.expires_at.map(|t| t.timestamp()),
                    link.created_at.timestamp(),
                ],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to insert shared link: {}", e)))?;
            Ok(())
        })
    }

    /// Find the active link for (user, conversation), if one exists.
    pub fn find_for_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Option<SharedLink>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM shared_links
                     WHERE user_id = ?1 AND conversation_id = ?2",
                    SHARED_LINK_COLUMNS
                ))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(
                    rusqlite::params![user_id.to_string(), conversation_id.to_string()],
                    |row| Ok(row_to_shared_link(row)),
                )
                .optional()
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            match result {
                Some(link) => Ok(Some(link?)),
                None => Ok(None),
            }
        })
    }

    /// Resolve a link by its public token.
    pub fn find_by_token(&self, token: &str) -> Result<Option<SharedLink>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM shared_links WHERE token = ?1",
                    SHARED_LINK_COLUMNS
                ))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![token], |row| Ok(row_to_shared_link(row)))
                .optional()
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            match result {
                Some(link) => Ok(Some(link?)),
                None => Ok(None),
            }
        })
    }

    /// Increment the view counter and return the new count.
    pub fn increment_views(&self, id: Uuid) -> Result<u64, CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE shared_links SET view_count = view_count + 1 WHERE id = ?1",
                rusqlite::params![id.to_string()],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to increment views: {}", e)))?;

            let count: i64 = conn
                .query_row(
                    "SELECT view_count FROM shared_links WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| CounselError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    /// Hard-revoke every link for a conversation. Returns the number removed.
    pub fn delete_for_conversation(&self, conversation_id: Uuid) -> Result<u64, CounselError> {
        self.db.with_conn(|conn| {
            let affected = conn
                .execute(
                    "DELETE FROM shared_links WHERE conversation_id = ?1",
                    rusqlite::params![conversation_id.to_string()],
                )
                .map_err(|e| {
                    CounselError::Storage(format!("Failed to delete shared links: {}", e))
                })?;
            Ok(affected as u64)
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
