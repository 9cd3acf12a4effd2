//! Repositories for user accounts and refresh tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use counsel_core::error::CounselError;
use counsel_core::types::{Provider, User};

use crate::db::Database;
use crate::repository::{from_epoch, opt_from_epoch, parse_uuid};

const USER_COLUMNS: &str = "id, email, password_hash, name, avatar, provider, share_enabled, \
     last_login_at, created_at, updated_at";

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, CounselError> {
    let storage = |e: rusqlite::Error| CounselError::Storage(e.to_string());
    let provider_str: String = row.get(5).map_err(storage)?;
    Ok(User {
        id: parse_uuid(&row.get::<_, String>(0).map_err(storage)?)?,
        email: row.get(1).map_err(storage)?,
        password_hash: row.get(2).map_err(storage)?,
        name: row.get(3).map_err(storage)?,
        avatar: row.get(4).map_err(storage)?,
        provider: Provider::parse(&provider_str).ok_or_else(|| {
            CounselError::Storage(format!("Unknown provider in row: {}", provider_str))
        })?,
        share_enabled: row.get::<_, i64>(6).map_err(storage)? != 0,
        last_login_at: opt_from_epoch(row.get(7).map_err(storage)?),
        created_at: from_epoch(row.get(8).map_err(storage)?),
        updated_at: from_epoch(row.get(9).map_err(storage)?),
    })
}

/// Repository for user accounts.
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new user. Fails on duplicate email (UNIQUE constraint).
    pub fn insert(&self, user: &User) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, name, avatar, provider,
                                    share_enabled, last_login_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.name,
                    user.avatar,
                    user.provider.as_str(),
                    user.share_enabled as i32,
                    user.last_login_at.map(|t| t.timestamp()),
                    user.created_at.timestamp(),
                    user.updated_at.timestamp(),
                ],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to insert user: {}", e)))?;
            Ok(())
        })
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![email], |row| Ok(row_to_user(row)))
                .optional()
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            match result {
                Some(user) => Ok(Some(user?)),
                None => Ok(None),
            }
        })
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id.to_string()], |row| Ok(row_to_user(row)))
                .optional()
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            match result {
                Some(user) => Ok(Some(user?)),
                None => Ok(None),
            }
        })
    }

    pub fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_login_at = ?2, updated_at = ?2 WHERE id = ?1",
                rusqlite::params![id.to_string(), at.timestamp()],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to update last login: {}", e)))?;
            Ok(())
        })
    }

    /// Flip the global sharing kill-switch for a user.
    pub fn set_share_enabled(&self, id: Uuid, enabled: bool) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET share_enabled = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id.to_string(), enabled as i32, Utc::now().timestamp()],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to set share flag: {}", e)))?;
            Ok(())
        })
    }

    /// Update profile fields that were provided; others are left untouched.
    pub fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<Option<User>, CounselError> {
        self.db.with_conn(|conn| {
            let now = Utc::now().timestamp();
            if let Some(name) = name {
                conn.execute(
                    "UPDATE users SET name = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![id.to_string(), name, now],
                )
                .map_err(|e| CounselError::Storage(format!("Failed to update name: {}", e)))?;
            }
            if let Some(avatar) = avatar {
                conn.execute(
                    "UPDATE users SET avatar = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![id.to_string(), avatar, now],
                )
                .map_err(|e| CounselError::Storage(format!("Failed to update avatar: {}", e)))?;
            }
            Ok(())
        })?;
        self.find_by_id(id)
    }
}

/// A persisted refresh token row.
#[derive(Clone, Debug)]
pub struct StoredRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Repository for refresh tokens.
pub struct RefreshTokenRepository {
    db: Arc<Database>,
}

impl RefreshTokenRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn insert(&self, token: &StoredRefreshToken) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (id, user_id, token, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    token.id.to_string(),
                    token.user_id.to_string(),
                    token.token,
                    token.expires_at.timestamp(),
                ],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to insert refresh token: {}", e)))?;
            Ok(())
        })
    }

    /// Find a stored token for the user that has not yet expired.
    pub fn find_valid(
        &self,
        user_id: Uuid,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredRefreshToken>, CounselError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, token, expires_at FROM refresh_tokens
                     WHERE user_id = ?1 AND token = ?2 AND expires_at >= ?3",
                )
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(
                    rusqlite::params![user_id.to_string(), token, now.timestamp()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| CounselError::Storage(e.to_string()))?;

            match result {
                Some((id, user, token, expires)) => Ok(Some(StoredRefreshToken {
                    id: parse_uuid(&id)?,
                    user_id: parse_uuid(&user)?,
                    token,
                    expires_at: from_epoch(expires),
                })),
                None => Ok(None),
            }
        })
    }

    pub fn delete_by_id(&self, id: Uuid) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM refresh_tokens WHERE id = ?1",
                rusqlite::params![id.to_string()],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to delete refresh token: {}", e)))?;
            Ok(())
        })
    }

    /// Delete a specific (user, token) pair, as on logout.
    pub fn delete_token(&self, user_id: Uuid, token: &str) -> Result<(), CounselError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM refresh_tokens WHERE user_id = ?1 AND token = ?2",
                rusqlite::params![user_id.to_string(), token],
            )
            .map_err(|e| CounselError::Storage(format!("Failed to delete refresh token: {}", e)))?;
            Ok(())
        })
    }
}
