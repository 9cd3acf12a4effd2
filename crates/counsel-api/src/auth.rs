//! Credential issuance and bearer authentication.
//!
//! Short-lived access JWTs plus rotating refresh tokens persisted in
//! storage. The `require_auth` middleware validates
//! `Authorization: Bearer <token>` on protected endpoints and injects the
//! caller's user id into request extensions.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use counsel_cache::{user_key, CacheStore};
use counsel_core::config::AuthConfig;
use counsel_core::types::{Provider, User};
use counsel_storage::{Database, RefreshTokenRepository, StoredRefreshToken, UserRepository};

use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims carried by both access and refresh tokens.
///
/// The `jti` nonce makes every issued token distinct even within one
/// clock second; refresh tokens are stored and rotated by exact value.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// The user id.
    sub: String,
    jti: String,
    iat: i64,
    exp: i64,
}

/// The authenticated caller, injected into request extensions.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser(pub Uuid);

/// A freshly issued token pair.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration/login result: the user plus a token pair.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Registers, authenticates, and refreshes users.
pub struct AuthService {
    users: UserRepository,
    refresh_tokens: RefreshTokenRepository,
    cache: Arc<dyn CacheStore>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(db: Arc<Database>, cache: Arc<dyn CacheStore>, config: AuthConfig) -> Self {
        Self {
            users: UserRepository::new(Arc::clone(&db)),
            refresh_tokens: RefreshTokenRepository::new(db),
            cache,
            config,
        }
    }

    /// Register a local-provider user.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthSession, ApiError> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(ApiError::BadRequest("A valid email is required".to_string()));
        }
        if password.is_empty() {
            return Err(ApiError::BadRequest("Password is required".to_string()));
        }

        if self.users.find_by_email(email)?.is_some() {
            return Err(ApiError::BadRequest("User already exists".to_string()));
        }

        let password_hash = bcrypt::hash(password, self.config.bcrypt_cost)
            .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: Some(password_hash),
            name: name.to_string(),
            avatar: None,
            provider: Provider::Local,
            share_enabled: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(&user)?;
        debug!(user_id = %user.id, "User registered");

        let tokens = self.issue_tokens(user.id)?;
        self.store_refresh(user.id, &tokens.refresh_token)?;

        Ok(AuthSession {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    /// Log a user in with email + password.
    ///
    /// Unknown email and wrong password are deliberately indistinguishable.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

        let mut user = self.users.find_by_email(email)?.ok_or_else(invalid)?;
        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        let valid = bcrypt::verify(password, hash)
            .map_err(|e| ApiError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            return Err(invalid());
        }

        let now = Utc::now();
        self.users.update_last_login(user.id, now)?;
        user.last_login_at = Some(now);

        let tokens = self.issue_tokens(user.id)?;
        self.store_refresh(user.id, &tokens.refresh_token)?;

        Ok(AuthSession {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    /// Exchange a refresh token for a new pair, rotating the old one out.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let invalid = || ApiError::Unauthorized("Invalid refresh token".to_string());

        let claims = self
            .decode_claims(refresh_token, &self.config.refresh_secret)
            .map_err(|_| invalid())?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| invalid())?;

        let stored = self
            .refresh_tokens
            .find_valid(user_id, refresh_token, Utc::now())?
            .ok_or_else(invalid)?;

        // Rotation: the presented token is single-use.
        self.refresh_tokens.delete_by_id(stored.id)?;

        let tokens = self.issue_tokens(user_id)?;
        self.store_refresh(user_id, &tokens.refresh_token)?;
        Ok(tokens)
    }

    /// Invalidate one refresh token and drop the user's cached listings.
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str) -> Result<(), ApiError> {
        self.refresh_tokens.delete_token(user_id, refresh_token)?;
        let _ = self.cache.delete(&user_key(&user_id.to_string())).await;
        Ok(())
    }

    /// Validate an access token and return the caller's user id.
    pub fn verify_access(&self, token: &str) -> Result<Uuid, ApiError> {
        let claims = self
            .decode_claims(token, &self.config.jwt_secret)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;
        Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))
    }

    fn issue_tokens(&self, user_id: Uuid) -> Result<TokenPair, ApiError> {
        let now = Utc::now();
        let access = self.encode_claims(
            user_id,
            now + Duration::minutes(self.config.access_ttl_minutes),
            &self.config.jwt_secret,
        )?;
        let refresh = self.encode_claims(
            user_id,
            now + Duration::days(self.config.refresh_ttl_days),
            &self.config.refresh_secret,
        )?;
        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
        })
    }

    fn encode_claims(
        &self,
        user_id: Uuid,
        expires_at: chrono::DateTime<Utc>,
        secret: &str,
    ) -> Result<String, ApiError> {
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Token signing failed: {}", e)))
    }

    fn decode_claims(&self, token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    fn store_refresh(&self, user_id: Uuid, token: &str) -> Result<(), ApiError> {
        self.refresh_tokens.insert(&StoredRefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at: Utc::now() + Duration::days(self.config.refresh_ttl_days),
        })?;
        Ok(())
    }
}

/// Middleware that validates Bearer token authentication.
///
/// Extracts the token from `Authorization: Bearer <token>`, validates it,
/// and injects [`AuthUser`] into request extensions. Returns 401 when the
/// header is missing or the token does not verify.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) => match state.auth.verify_access(token) {
            Ok(user_id) => {
                req.extensions_mut().insert(AuthUser(user_id));
                next.run(req).await
            }
            Err(err) => err.into_response(),
        },
        None => {
            ApiError::Unauthorized("Missing Authorization header".to_string()).into_response()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
