//! View types returned by the orchestration services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use counsel_core::types::{Conversation, Message, MessageMetadata, Mode, Role};

/// A file uploaded alongside a message.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Optional language hints forwarded to the upload-and-chat endpoint.
#[derive(Clone, Debug, Default)]
pub struct LanguageHints {
    pub input_language: Option<String>,
    pub output_language: Option<String>,
}

/// The assistant message produced by a send, as returned to the caller.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessageView {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub metadata: MessageMetadata,
}

/// Up-to-date affinity after a send, taken from the reply just processed
/// so the caller needs no second read.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAffinity {
    pub id: Uuid,
    pub session_id: Option<String>,
    pub document_id: Option<String>,
}

/// Result of `ConversationService::send_message`.
#[derive(Clone, Debug, Serialize)]
pub struct SendMessageOutcome {
    pub message: AssistantMessageView,
    pub conversation: ConversationAffinity,
}

/// A conversation annotated with its single most recent message, as shown
/// in the conversation list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListing {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Option<Message>,
}

/// A conversation with its full ordered history.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationWithMessages {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Mode/document/session metadata for a conversation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInfo {
    pub id: Uuid,
    pub title: String,
    pub mode: Mode,
    pub document_id: Option<String>,
    pub document_name: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationInfo {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            title: c.title,
            mode: c.mode,
            document_id: c.document_id,
            document_name: c.document_name,
            session_id: c.session_id,
            created_at: c.created_at,
        }
    }
}

/// An active share link, as returned to its owner.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkView {
    pub token: String,
    pub conversation_id: Uuid,
    pub view_count: u64,
    pub max_views: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Read-only message projection exposed through a share link.
///
/// Deliberately narrow: no user ids and no internal metadata.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedMessageView {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for SharedMessageView {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            attachments: m.attachments,
            created_at: m.created_at,
        }
    }
}

/// Public snapshot of a shared conversation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedConversationView {
    pub id: Uuid,
    pub title: String,
    pub mode: Mode,
    pub created_at: DateTime<Utc>,
    pub view_count: u64,
    pub messages: Vec<SharedMessageView>,
}

/// Result of a translation request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub source_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub cached: bool,
}

/// Result of language detection.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageDetection {
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Listing projection for generated documents.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListing {
    pub id: Uuid,
    pub title: String,
    pub format: String,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
