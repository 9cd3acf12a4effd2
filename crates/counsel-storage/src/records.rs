//! Repositories for translation history and generated documents.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use uuid::Uuid;

use counsel_core::error::CounselError;
use counsel_core::types::{GeneratedDocument, Translation};

use crate::db::Database;
use crate::repository::{from_epoch, parse_uuid};

fn row_to_translation(row: &rusqlite::Row<'_>) -> Result<Translation, CounselError> {
    let storage = |e: rusqlite::Error| CounselError::Storage(e.to_string());
    Ok(Translation {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage)?)?,
        user_id: parse_uuid(&row.get::<_, String>(1).map_err(storage)?)?,
        source_text: row.get(2).map_err(storage)?,
        translated_text: row.get(3).map_err(storage)?,
        source_lang: row.get(4).map_err(storage)?,
        target_lang: row.get(5).map_err(storage)?,
        created_at: from_epoch(row.get(6).map_err(storage)?),
    })
}

fn row_to_document(row: &rusqlite::Row<'_>) -> Result<GeneratedDocument, CounselError> {
    let storage = |e: rusqlite::Error| CounselError::Storage(e.to_string());
    Ok(GeneratedDocument {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage)?)?,
        user_id: parse_uuid(&row.get::<_, String>(1).map_err(storage)?)?,
        title: row.get(2).map_err(storage)?,
        content: row.get(3).map_err(storage)?,
        format: row.get(4).map_err(storage)?,
        file_url: row.get(5).map_err(storage)?,
        prompt: row.get(6).map_err(storage)?,
        generated_by: row.get(7).map_err(storage)?,
        created_at: from_epoch(row.get(8).map_err(storage)?),
    })
}

/// Repository for translation history.
pub struct TranslationRepository {
    db: Arc<Database>,
}

impl TranslationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn insert(&self, translation: &Translation) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO translations (id, user_id, source_text, translated_text,
                                           source_lang, target_lang, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    translation.id.to_string(),
                    translation.user_id.to_string(),
                    translation.source_text,
                    translation.translated_text,
                    translation.source_lang,
                    translation.target_lang,
                    translation.created_at.timestamp(),
                ],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to insert translation: {}", e)))?;
            Ok(())
        })
    }

    /// Most recent translations for a user, newest first.
    pub fn list_recent_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Translation>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, source_text, translated_text, source_lang, target_lang,
                            created_at
                     FROM translations WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?2",
                )
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string(), limit], |row| {
                    Ok(row_to_translation(row))
                })
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let mut translations = Vec::new();
            for row in rows {
                translations.push(row.map_err(|e| CounselError::Storage(e.to_string()))??);
            }
            Ok(translations)
        })
    }
}

/// Repository for generated documents.
pub struct DocumentRepository {
    db: Arc<Database>,
}

impl DocumentRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn insert(&self, document: &GeneratedDocument) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (id, user_id, title, content, format, file_url, prompt,
                                        generated_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    document.id.to_string(),
                    document.user_id.to_string(),
                    document.title,
                    document.content,
                    document.format,
                    document.file_url,
                    document.prompt,
                    document.generated_by,
                    document.created_at.timestamp(),
                ],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to insert document: {}", e)))?;
            Ok(())
        })
    }

    pub fn list_for_user(&self, user_id: Uuid) -> Result<Vec<GeneratedDocument>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, title, content, format, file_url, prompt, generated_by,
                            created_at
                     FROM documents WHERE user_id = ?1
                     ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id.to_string()], |row| {
                    Ok(row_to_document(row))
                })
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let mut documents = Vec::new();
            for row in rows {
                documents.push(row.map_err(|e| CounselError::Storage(e.to_string()))??);
            }
            Ok(documents)
        })
    }

    pub fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<GeneratedDocument>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, title, content, format, file_url, prompt, generated_by,
                            created_at
                     FROM documents WHERE id = ?1 AND user_id = ?2",
                )
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(
                    rusqlite::params![id.to_string(), user_id.to_string()],
                    |row| Ok(row_to_document(row)),
                )
                .optional()
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            match result {
                Some(document) => Ok(Some(document?)),
                None => Ok(None),
            }
        })
    }

    /// Ownership-checked delete. Returns true when a row was removed.
    pub fn delete_for_user(&self, id: Uuid, user_id: Uuid) -> Result<bool, CounselError> {
        self.db.with_conn(|conn| {
            let affected = conn
                .execute(
                    "DELETE FROM documents WHERE id = ?1 AND user_id = ?2",
                    rusqlite::params![id.to_string(), user_id.to_string()],
                )
                .map_err(|e| CounselError::Storage(format!("Failed to delete document: {}", e)))?;
            Ok(affected > 0)
        })
    }
}
