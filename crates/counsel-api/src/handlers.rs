//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path/body parameters via axum extractors,
//! delegates to the services on AppState, and returns JSON responses.
//! `send_message` accepts either a JSON body or multipart/form-data with
//! a single `file` part.

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use counsel_chat::{
    ConversationInfo, ConversationListing, ConversationWithMessages, DocumentListing,
    LanguageDetection, LanguageHints, SendMessageOutcome, SharedConversationView,
    TranslationResult, UploadedFile,
};
use counsel_core::types::{Conversation, GeneratedDocument, Mode, Translation, User};

use crate::auth::{AuthSession, AuthUser, TokenPair};
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request body types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationBody {
    pub mode: Option<String>,
    pub title: Option<String>,
    pub document_id: Option<String>,
    pub document_name: Option<String>,
    pub session_id: Option<String>,
}

/// Body of a send; field names match the wire format of both the JSON and
/// the multipart encodings (language hints are snake_case on the wire).
#[derive(Debug, Default, Deserialize)]
pub struct SendMessageBody {
    pub message: Option<String>,
    pub mode: Option<String>,
    pub input_language: Option<String>,
    pub output_language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShareBody {
    pub share: bool,
}

#[derive(Debug, Deserialize)]
pub struct TranslateBody {
    pub text: String,
    #[serde(default = "default_source_lang")]
    pub source_lang: String,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
}

fn default_source_lang() -> String {
    "en".to_string()
}

fn default_target_lang() -> String {
    "hi".to_string()
}

#[derive(Debug, Deserialize)]
pub struct DetectLanguageBody {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateDocumentBody {
    pub prompt: String,
    #[serde(default = "default_document_format")]
    pub format: String,
}

fn default_document_format() -> String {
    "pdf".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileBody {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllResponse {
    pub deleted_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub shared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Path a client appends to its own origin to build the public URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid id".to_string()))
}

fn parse_mode(raw: Option<&str>) -> Result<Mode, ApiError> {
    raw.and_then(Mode::parse).ok_or_else(|| {
        ApiError::BadRequest("Mode is required and must be either NORMAL or AGENTIC".to_string())
    })
}

// =============================================================================
// Public handlers
// =============================================================================

/// GET /health - liveness and uptime.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<AuthSession>), ApiError> {
    let session = state
        .auth
        .register(&body.email, &body.password, &body.name)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<AuthSession>, ApiError> {
    Ok(Json(state.auth.login(&body.email, &body.password).await?))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<TokenPair>, ApiError> {
    Ok(Json(state.auth.refresh(&body.refresh_token).await?))
}

/// GET /shared/{token} - public, unauthenticated read of a shared
/// conversation. Possession of the token is the only credential.
pub async fn resolve_shared(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SharedConversationView>, ApiError> {
    Ok(Json(state.sharing.resolve_shared_link(&token).await?))
}

// =============================================================================
// Auth-required handlers
// =============================================================================

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<StatusMessage>, ApiError> {
    state.auth.logout(user_id, &body.refresh_token).await?;
    Ok(Json(StatusMessage {
        message: "Logged out".to_string(),
    }))
}

/// POST /conversations
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<CreateConversationBody>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let mode = parse_mode(body.mode.as_deref())?;
    let conversation = state
        .conversations
        .create_conversation(
            user_id,
            body.title,
            mode,
            body.document_id,
            body.document_name,
            body.session_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationListing>>, ApiError> {
    Ok(Json(state.conversations.get_conversations(user_id).await?))
}

/// DELETE /conversations
pub async fn delete_all_conversations(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<DeleteAllResponse>, ApiError> {
    let deleted_count = state
        .conversations
        .delete_all_conversations(user_id)
        .await?;
    Ok(Json(DeleteAllResponse { deleted_count }))
}

/// GET /conversations/{id}
pub async fn get_conversation_messages(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ConversationWithMessages>, ApiError> {
    let conversation_id = parse_id(&id)?;
    Ok(Json(
        state
            .conversations
            .get_conversation_messages(user_id, conversation_id)
            .await?,
    ))
}

/// GET /conversations/{id}/info
pub async fn get_conversation_info(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ConversationInfo>, ApiError> {
    let conversation_id = parse_id(&id)?;
    Ok(Json(
        state
            .conversations
            .get_conversation_info(user_id, conversation_id)
            .await?,
    ))
}

/// DELETE /conversations/{id}
pub async fn delete_conversation(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let conversation_id = parse_id(&id)?;
    state
        .conversations
        .delete_conversation(user_id, conversation_id)
        .await?;
    Ok(Json(StatusMessage {
        message: "Conversation deleted successfully".to_string(),
    }))
}

/// POST /conversations/{id}/messages
///
/// Accepts `application/json` for text-only turns and
/// `multipart/form-data` (fields: message, mode, input_language,
/// output_language, plus one `file` part) for upload turns.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<SendMessageOutcome>, ApiError> {
    let conversation_id = parse_id(&id)?;

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let (body, file) = if is_multipart {
        read_multipart(request).await?
    } else {
        let bytes = axum::body::to_bytes(
            request.into_body(),
            state.config.general.max_upload_bytes,
        )
        .await
        .map_err(|e| ApiError::BadRequest(format!("Unreadable request body: {}", e)))?;
        let body: SendMessageBody = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
        (body, None)
    };

    let message = body
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Message is required".to_string()))?
        .to_string();
    let mode = parse_mode(body.mode.as_deref())?;

    let hints = LanguageHints {
        input_language: body.input_language,
        output_language: body.output_language,
    };

    let outcome = state
        .conversations
        .send_message(user_id, conversation_id, &message, mode, file, hints)
        .await?;
    Ok(Json(outcome))
}

/// Parse a multipart send-message request.
async fn read_multipart(
    request: Request,
) -> Result<(SendMessageBody, Option<UploadedFile>), ApiError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?;

    let mut body = SendMessageBody::default();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart field: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "message" => body.message = field.text().await.ok(),
            "mode" => body.mode = field.text().await.ok(),
            "input_language" => {
                body.input_language = field.text().await.ok().filter(|s| !s.is_empty())
            }
            "output_language" => {
                body.output_language = field.text().await.ok().filter(|s| !s.is_empty())
            }
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "upload".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some(UploadedFile {
                    bytes: bytes.to_vec(),
                    file_name,
                });
            }
            _ => {}
        }
    }

    Ok((body, file))
}

/// POST /conversations/{id}/share - enable or disable sharing.
pub async fn set_share(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<ShareBody>,
) -> Result<Json<ShareResponse>, ApiError> {
    let conversation_id = parse_id(&id)?;

    if body.share {
        let link = state.sharing.enable_share(user_id, conversation_id).await?;
        Ok(Json(ShareResponse {
            shared: true,
            url: Some(format!("/shared/{}", link.token)),
            token: Some(link.token),
        }))
    } else {
        state
            .sharing
            .disable_share(user_id, conversation_id)
            .await?;
        Ok(Json(ShareResponse {
            shared: false,
            token: None,
            url: None,
        }))
    }
}

/// POST /translate
pub async fn translate(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<TranslateBody>,
) -> Result<Json<TranslationResult>, ApiError> {
    Ok(Json(
        state
            .translations
            .translate(user_id, &body.text, &body.source_lang, &body.target_lang)
            .await?,
    ))
}

/// POST /translate/detect
pub async fn detect_language(
    State(state): State<AppState>,
    Extension(AuthUser(_user_id)): Extension<AuthUser>,
    Json(body): Json<DetectLanguageBody>,
) -> Result<Json<LanguageDetection>, ApiError> {
    Ok(Json(state.translations.detect_language(&body.text).await?))
}

/// GET /translations
pub async fn list_translations(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<Translation>>, ApiError> {
    Ok(Json(
        state.translations.get_user_translations(user_id).await?,
    ))
}

/// POST /documents/generate
pub async fn generate_document(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<GenerateDocumentBody>,
) -> Result<(StatusCode, Json<GeneratedDocument>), ApiError> {
    let document = state
        .documents
        .generate_document(user_id, &body.prompt, &body.format)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /documents
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<DocumentListing>>, ApiError> {
    Ok(Json(state.documents.get_user_documents(user_id).await?))
}

/// GET /documents/{id}
pub async fn get_document(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<GeneratedDocument>, ApiError> {
    let document_id = parse_id(&id)?;
    Ok(Json(
        state.documents.get_document(user_id, document_id).await?,
    ))
}

/// DELETE /documents/{id}
pub async fn delete_document(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let document_id = parse_id(&id)?;
    state.documents.delete_document(user_id, document_id).await?;
    Ok(Json(StatusMessage {
        message: "Document deleted successfully".to_string(),
    }))
}

/// GET /users/me
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

/// PUT /users/me
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<UpdateProfileBody>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .users
        .update_profile(user_id, body.name.as_deref(), body.avatar.as_deref())?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}
