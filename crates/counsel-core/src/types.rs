use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Conversation mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Stateless single-turn chat against the general model.
    Normal,
    /// Tool-using agent with session/document continuity.
    Agentic,
}

impl Mode {
    /// Wire/database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Agentic => "AGENTIC",
        }
    }

    /// Parse the wire/database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NORMAL" => Some(Mode::Normal),
            "AGENTIC" => Some(Mode::Agentic),
            _ => None,
        }
    }
}

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Role::User),
            "ASSISTANT" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// Identity provider a user registered through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    /// Email + password.
    Local,
    /// OAuth via Google.
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Local => "LOCAL",
            Provider::Google => "GOOGLE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOCAL" => Some(Provider::Local),
            "GOOGLE" => Some(Provider::Google),
            _ => None,
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// A registered user.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Absent for OAuth users.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    pub name: String,
    pub avatar: Option<String>,
    pub provider: Provider,
    /// Global sharing kill-switch. When false, none of this user's share
    /// links resolve.
    pub share_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A conversation owned by a single user.
///
/// `document_id` and `session_id` are affinity tokens issued by the AI
/// backend; they are only populated in AGENTIC mode and, once set, persist
/// across turns until replaced by a newer backend-supplied value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub mode: Mode,
    pub document_id: Option<String>,
    pub document_name: Option<String>,
    pub session_id: Option<String>,
    pub is_shared: bool,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single chat turn. Immutable once created.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    /// Uploaded file names attached to this turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    pub created_at: DateTime<Utc>,
}

/// One tool invocation recorded by the agent backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_time_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u64>,
}

/// Structured assistant-message metadata.
///
/// Field names mirror the backend wire format (snake_case) since this is
/// a distillation of the raw reply, not an API-facing projection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// True when the reply was served from the response cache.
    #[serde(default)]
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<ToolUsage>,
    /// Sum of per-tool query latencies, rounded to 2 decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_query_time_ms: Option<f64>,
    /// Largest total-chunk count seen across tool invocations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

/// Capability token granting public read access to a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedLink {
    pub id: Uuid,
    /// Unguessable random token; possession is the only credential.
    pub token: String,
    pub user_id: Uuid,
    pub conversation_id: Uuid,
    pub view_count: u64,
    pub max_views: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A completed translation request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub created_at: DateTime<Utc>,
}

/// A document produced by the generation backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub format: String,
    pub file_url: Option<String>,
    pub prompt: String,
    pub generated_by: String,
    pub created_at: DateTime<Utc>,
}
