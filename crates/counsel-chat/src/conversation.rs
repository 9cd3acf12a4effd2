//! The conversation state manager.
//!
//! Owns conversation records and the per-turn routing decision: which
//! backend variant to call, how to thread session/document affinity, and
//! how to keep the response cache coherent with persisted state.
//!
//! Ordering within one send: the user message is persisted strictly before
//! the assistant message, so a crash mid-turn never leaves an assistant
//! reply without its prompting user message. Affinity updates are their
//! own persistence step, applied right after the backend call returns.
//! Concurrent sends to the same conversation are not serialized; the last
//! writer's affinity update wins.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use counsel_backend::{AiBackend, BackendReply};
use counsel_cache::{user_key, CacheStore};
use counsel_core::config::CacheConfig;
use counsel_core::types::{Conversation, Message, MessageMetadata, Mode, Role};
use counsel_storage::{ConversationRepository, Database, MessageRepository};

use crate::cache_gate::ResponseCacheGate;
use crate::error::ChatError;
use crate::types::{
    AssistantMessageView, ConversationAffinity, ConversationInfo, ConversationListing,
    ConversationWithMessages, LanguageHints, SendMessageOutcome, UploadedFile,
};

/// Recent messages loaded as conversational context per turn.
const CONTEXT_WINDOW: u64 = 20;

/// Assemble assistant-message metadata from a classified reply.
fn build_metadata(
    reply: &BackendReply,
    cached: bool,
    document_id: Option<String>,
) -> MessageMetadata {
    let summary = reply.tool_summary();
    MessageMetadata {
        cached,
        tools_used: summary.tools_used,
        total_query_time_ms: summary.total_query_time_ms,
        total_chunks: summary.total_chunks,
        document_id,
    }
}

/// Orchestrates conversations, messages, backend routing, and caching.
pub struct ConversationService {
    conversations: ConversationRepository,
    messages: MessageRepository,
    backend: Arc<dyn AiBackend>,
    cache: Arc<dyn CacheStore>,
    gate: ResponseCacheGate,
    user_list_ttl: Duration,
}

impl ConversationService {
    pub fn new(
        db: Arc<Database>,
        backend: Arc<dyn AiBackend>,
        cache: Arc<dyn CacheStore>,
        cache_config: &CacheConfig,
    ) -> Self {
        let gate = ResponseCacheGate::new(
            Arc::clone(&cache),
            Duration::from_secs(cache_config.ai_response_ttl_secs),
        );
        Self {
            conversations: ConversationRepository::new(Arc::clone(&db)),
            messages: MessageRepository::new(db),
            backend,
            cache,
            gate,
            user_list_ttl: Duration::from_secs(cache_config.user_list_ttl_secs),
        }
    }

    /// Create a conversation. A default title is derived from the mode
    /// when none is given.
    pub async fn create_conversation(
        &self,
        user_id: Uuid,
        title: Option<String>,
        mode: Mode,
        document_id: Option<String>,
        document_name: Option<String>,
        session_id: Option<String>,
    ) -> Result<Conversation, ChatError> {
        let now = Utc::now();
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("{} Chat - {}", mode.as_str(), now.format("%Y-%m-%d %H:%M")));

        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            title,
            mode,
            document_id,
            document_name,
            session_id,
            is_shared: false,
            last_message_at: now,
            created_at: now,
            updated_at: now,
        };
        self.conversations.insert(&conversation)?;
        self.invalidate_user_cache(user_id).await;
        Ok(conversation)
    }

    /// Handle one user turn.
    ///
    /// File-less turns consult the response cache first; a hit
    /// short-circuits the routing decision entirely and the affinity in
    /// the outcome comes from the cached reply (deliberately not
    /// re-verified against the conversation row).
    pub async fn send_message(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
        message: &str,
        mode: Mode,
        file: Option<UploadedFile>,
        hints: LanguageHints,
    ) -> Result<SendMessageOutcome, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::Validation("message cannot be empty".to_string()));
        }

        let conversation = self
            .conversations
            .find_for_user(conversation_id, user_id)?
            .ok_or(ChatError::ConversationNotFound)?;

        let context = self.messages.recent_window(conversation_id, CONTEXT_WINDOW)?;
        debug!(
            conversation_id = %conversation_id,
            mode = mode.as_str(),
            context_messages = context.len(),
            has_file = file.is_some(),
            "Handling message"
        );

        if file.is_none() {
            if let Some(cached) = self.gate.lookup(message, mode).await {
                let reply = BackendReply::classify(&cached);
                return self.persist_cached_turn(&conversation, message, &reply);
            }
        }

        // Routing decision tree, evaluated in precedence order.
        let raw = if let (Some(upload), Mode::Agentic) = (file.as_ref(), mode) {
            // 1. Fresh upload: bind (or rebind) a document to this conversation.
            self.backend
                .upload_and_chat(
                    upload.bytes.clone(),
                    &upload.file_name,
                    message,
                    conversation.session_id.as_deref(),
                    hints.input_language.as_deref(),
                    hints.output_language.as_deref(),
                )
                .await?
        } else if mode == Mode::Agentic && conversation.document_id.is_some() {
            // 2. Follow-up over the bound document.
            self.backend
                .agent_chat(
                    message,
                    conversation.session_id.as_deref(),
                    conversation.document_id.as_deref(),
                )
                .await?
        } else if mode == Mode::Agentic {
            // 3. Agent chat without a document.
            self.backend
                .agent_chat(message, conversation.session_id.as_deref(), None)
                .await?
        } else {
            // 4. Plain chat; affinity fields are never touched.
            self.backend.chat(message).await?
        };

        let reply = BackendReply::classify(&raw);

        // Affinity persistence, ordered before the message writes.
        match (file.as_ref(), mode) {
            (Some(upload), Mode::Agentic) => {
                let document = reply.document_id().map(|id| (id, upload.file_name.as_str()));
                self.conversations
                    .update_affinity(conversation_id, document, reply.session_id())?;
            }
            (None, Mode::Agentic) => {
                if let Some(session) = reply.session_id() {
                    if conversation.session_id.as_deref() != Some(session) {
                        self.conversations
                            .update_affinity(conversation_id, None, Some(session))?;
                    }
                }
            }
            _ => {}
        }

        if file.is_none() {
            self.gate.store(message, mode, &raw).await;
        }

        let now = Utc::now();
        let user_message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role: Role::User,
            content: message.to_string(),
            attachments: file
                .as_ref()
                .map(|f| vec![f.file_name.clone()])
                .unwrap_or_default(),
            metadata: None,
            created_at: now,
        };
        self.messages.insert(&user_message)?;

        let document_id = conversation
            .document_id
            .clone()
            .or_else(|| reply.document_id().map(str::to_string));
        let metadata = build_metadata(&reply, false, document_id);
        let assistant_message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            role: Role::Assistant,
            content: reply.text(),
            attachments: Vec::new(),
            metadata: Some(metadata.clone()),
            created_at: now,
        };
        self.messages.insert(&assistant_message)?;

        self.conversations.touch_last_message(conversation_id, now)?;
        self.invalidate_user_cache(user_id).await;

        Ok(SendMessageOutcome {
            message: AssistantMessageView {
                id: assistant_message.id,
                role: Role::Assistant,
                content: assistant_message.content,
                created_at: assistant_message.created_at,
                metadata,
            },
            conversation: ConversationAffinity {
                id: conversation_id,
                session_id: reply.session_id().map(str::to_string),
                document_id: reply.document_id().map(str::to_string),
            },
        })
    }

    /// Persist a turn answered from the cache: no backend call, no
    /// affinity write, no cache refresh.
    fn persist_cached_turn(
        &self,
        conversation: &Conversation,
        message: &str,
        reply: &BackendReply,
    ) -> Result<SendMessageOutcome, ChatError> {
        let now = Utc::now();
        let user_message = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            role: Role::User,
            content: message.to_string(),
            attachments: Vec::new(),
            metadata: None,
            created_at: now,
        };
        self.messages.insert(&user_message)?;

        let metadata = build_metadata(reply, true, reply.document_id().map(str::to_string));
        let assistant_message = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            role: Role::Assistant,
            content: reply.text(),
            attachments: Vec::new(),
            metadata: Some(metadata.clone()),
            created_at: now,
        };
        self.messages.insert(&assistant_message)?;

        self.conversations.touch_last_message(conversation.id, now)?;

        Ok(SendMessageOutcome {
            message: AssistantMessageView {
                id: assistant_message.id,
                role: Role::Assistant,
                content: assistant_message.content,
                created_at: assistant_message.created_at,
                metadata,
            },
            conversation: ConversationAffinity {
                id: conversation.id,
                session_id: reply.session_id().map(str::to_string),
                document_id: reply.document_id().map(str::to_string),
            },
        })
    }

    /// List a user's conversations, most recently active first, each
    /// annotated with its latest message. Cached for 30 minutes and
    /// invalidated by every mutating operation on that user's data.
    pub async fn get_conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationListing>, ChatError> {
        let key = user_key(&user_id.to_string());

        if let Ok(Some(raw)) = self.cache.get(&key).await {
            match serde_json::from_str::<Vec<ConversationListing>>(&raw) {
                Ok(listings) => {
                    debug!(user_id = %user_id, "Conversation list served from cache");
                    return Ok(listings);
                }
                Err(e) => {
                    warn!(error = %e, "Unparseable conversation-list cache entry; purging");
                    let _ = self.cache.delete(&key).await;
                }
            }
        }

        let conversations = self.conversations.list_for_user(user_id)?;
        let mut listings = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let last_message = self.messages.latest_for_conversation(conversation.id)?;
            listings.push(ConversationListing {
                conversation,
                last_message,
            });
        }

        match serde_json::to_string(&listings) {
            Ok(serialized) => {
                if let Err(e) = self.cache.set(&key, &serialized, self.user_list_ttl).await {
                    warn!(error = %e, "Failed to cache conversation list");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize conversation list for caching"),
        }

        Ok(listings)
    }

    /// Fetch a conversation with its full ordered history.
    pub async fn get_conversation_messages(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<ConversationWithMessages, ChatError> {
        let conversation = self
            .conversations
            .find_for_user(conversation_id, user_id)?
            .ok_or(ChatError::ConversationNotFound)?;
        let messages = self.messages.list_for_conversation(conversation_id)?;
        Ok(ConversationWithMessages {
            conversation,
            messages,
        })
    }

    /// Fetch mode/document/session metadata.
    pub async fn get_conversation_info(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<ConversationInfo, ChatError> {
        let conversation = self
            .conversations
            .find_for_user(conversation_id, user_id)?
            .ok_or(ChatError::ConversationNotFound)?;
        Ok(conversation.into())
    }

    /// Ownership-checked hard delete; messages and links cascade.
    pub async fn delete_conversation(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<(), ChatError> {
        if !self.conversations.delete_for_user(conversation_id, user_id)? {
            return Err(ChatError::ConversationNotFound);
        }
        self.invalidate_user_cache(user_id).await;
        Ok(())
    }

    /// Delete every conversation the user owns; returns the count removed.
    pub async fn delete_all_conversations(&self, user_id: Uuid) -> Result<u64, ChatError> {
        let deleted = self.conversations.delete_all_for_user(user_id)?;
        self.invalidate_user_cache(user_id).await;
        Ok(deleted)
    }

    async fn invalidate_user_cache(&self, user_id: Uuid) {
        let key = user_key(&user_id.to_string());
        if let Err(e) = self.cache.delete(&key).await {
            warn!(error = %e, "Failed to invalidate user cache");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use counsel_backend::{BackendError, PLACEHOLDER_TEXT};
    use counsel_cache::MemoryCache;
    use counsel_core::types::{Provider, User};
    use counsel_storage::UserRepository;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A recorded outbound call, for asserting on routing decisions.
    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Chat,
        AgentChat {
            session_id: Option<String>,
            document_id: Option<String>,
        },
        Upload {
            file_name: String,
            session_id: Option<String>,
        },
    }

    /// Scripted backend double: pops one reply per call, default otherwise.
    struct MockBackend {
        calls: Mutex<Vec<Call>>,
        replies: Mutex<VecDeque<Value>>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(VecDeque::new()),
            }
        }

        fn script(&self, reply: Value) {
            self.replies.lock().unwrap().push_back(reply);
        }

        fn next_reply(&self) -> Value {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| json!({ "response": "default reply" }))
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AiBackend for MockBackend {
        async fn chat(&self, _prompt: &str) -> Result<Value, BackendError> {
            self.calls.lock().unwrap().push(Call::Chat);
            Ok(self.next_reply())
        }

        async fn agent_chat(
            &self,
            _message: &str,
            session_id: Option<&str>,
            document_id: Option<&str>,
        ) -> Result<Value, BackendError> {
            self.calls.lock().unwrap().push(Call::AgentChat {
                session_id: session_id.map(str::to_string),
                document_id: document_id.map(str::to_string),
            });
            Ok(self.next_reply())
        }

        async fn upload_and_chat(
            &self,
            _file: Vec<u8>,
            file_name: &str,
            _message: &str,
            session_id: Option<&str>,
            _input_language: Option<&str>,
            _output_language: Option<&str>,
        ) -> Result<Value, BackendError> {
            self.calls.lock().unwrap().push(Call::Upload {
                file_name: file_name.to_string(),
                session_id: session_id.map(str::to_string),
            });
            Ok(self.next_reply())
        }

        async fn translate(
            &self,
            _text: &str,
            _source_lang: &str,
            _target_lang: &str,
        ) -> Result<Value, BackendError> {
            Ok(self.next_reply())
        }

        async fn detect_language(&self, _text: &str) -> Result<Value, BackendError> {
            Ok(self.next_reply())
        }

        async fn generate_document(
            &self,
            _template_name: &str,
            _data: Value,
        ) -> Result<Value, BackendError> {
            Ok(self.next_reply())
        }
    }

    struct Fixture {
        service: ConversationService,
        backend: Arc<MockBackend>,
        user_id: Uuid,
    }

    fn seed_user(db: &Arc<Database>) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        UserRepository::new(Arc::clone(db))
            .insert(&User {
                id,
                email: format!("{}@example.com", id),
                password_hash: None,
                name: "Test".to_string(),
                avatar: None,
                provider: Provider::Local,
                share_enabled: true,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        id
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        let user_id = seed_user(&db);
        let backend = Arc::new(MockBackend::new());
        let cache = Arc::new(MemoryCache::new());
        let service = ConversationService::new(
            db,
            Arc::clone(&backend) as Arc<dyn AiBackend>,
            cache as Arc<dyn CacheStore>,
            &CacheConfig::default(),
        );
        Fixture {
            service,
            backend,
            user_id,
        }
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            bytes: b"%PDF-1.4 fake".to_vec(),
            file_name: name.to_string(),
        }
    }

    // ---- Conversation lifecycle ----

    #[tokio::test]
    async fn test_create_and_fetch_info_round_trip() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(
                f.user_id,
                Some("My Case".to_string()),
                Mode::Agentic,
                Some("doc-7".to_string()),
                Some("case.pdf".to_string()),
                Some("sess-7".to_string()),
            )
            .await
            .unwrap();

        let info = f
            .service
            .get_conversation_info(f.user_id, conversation.id)
            .await
            .unwrap();
        assert_eq!(info.title, "My Case");
        assert_eq!(info.mode, Mode::Agentic);
        assert_eq!(info.document_id.as_deref(), Some("doc-7"));
        assert_eq!(info.session_id.as_deref(), Some("sess-7"));
    }

    #[tokio::test]
    async fn test_default_title_mentions_mode() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Normal, None, None, None)
            .await
            .unwrap();
        assert!(conversation.title.starts_with("NORMAL Chat - "));
    }

    // ---- Ownership ----

    #[tokio::test]
    async fn test_foreign_conversation_is_not_found() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Normal, None, None, None)
            .await
            .unwrap();

        let stranger = Uuid::new_v4();
        let err = f
            .service
            .send_message(
                stranger,
                conversation.id,
                "hi",
                Mode::Normal,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ConversationNotFound));

        assert!(matches!(
            f.service
                .get_conversation_messages(stranger, conversation.id)
                .await
                .unwrap_err(),
            ChatError::ConversationNotFound
        ));
        assert!(matches!(
            f.service
                .delete_conversation(stranger, conversation.id)
                .await
                .unwrap_err(),
            ChatError::ConversationNotFound
        ));
    }

    // ---- Normal mode end-to-end ----

    #[tokio::test]
    async fn test_normal_mode_turn() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Normal, None, None, None)
            .await
            .unwrap();

        f.backend.script(json!({ "response": "Hello back." }));
        let outcome = f
            .service
            .send_message(
                f.user_id,
                conversation.id,
                "Hello",
                Mode::Normal,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.message.content, "Hello back.");
        assert!(outcome.conversation.session_id.is_none());
        assert!(outcome.conversation.document_id.is_none());
        assert_eq!(f.backend.calls(), vec![Call::Chat]);

        let with_messages = f
            .service
            .get_conversation_messages(f.user_id, conversation.id)
            .await
            .unwrap();
        assert_eq!(with_messages.messages.len(), 2);
        assert_eq!(with_messages.messages[0].role, Role::User);
        assert_eq!(with_messages.messages[0].content, "Hello");
        assert_eq!(with_messages.messages[1].role, Role::Assistant);
        assert!(!with_messages.messages[1].content.is_empty());
        assert!(
            with_messages.conversation.last_message_at >= conversation.last_message_at,
            "lastMessageAt must be refreshed"
        );
        // Affinity is never set in NORMAL mode.
        assert!(with_messages.conversation.session_id.is_none());
        assert!(with_messages.conversation.document_id.is_none());
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Normal, None, None, None)
            .await
            .unwrap();

        let err = f
            .service
            .send_message(
                f.user_id,
                conversation.id,
                "   ",
                Mode::Normal,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
        assert!(f.backend.calls().is_empty());
    }

    // ---- Cache coherence ----

    #[tokio::test]
    async fn test_repeated_message_hits_cache() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Normal, None, None, None)
            .await
            .unwrap();

        f.backend.script(json!({ "response": "The statute of frauds." }));

        let first = f
            .service
            .send_message(
                f.user_id,
                conversation.id,
                "What is the statute of frauds?",
                Mode::Normal,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();
        let second = f
            .service
            .send_message(
                f.user_id,
                conversation.id,
                "What is the statute of frauds?",
                Mode::Normal,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();

        // Exactly one live backend call.
        assert_eq!(f.backend.calls().len(), 1);
        assert_eq!(second.message.content, first.message.content);
        assert!(!first.message.metadata.cached);
        assert!(second.message.metadata.cached);

        // Both turns were persisted.
        let history = f
            .service
            .get_conversation_messages(f.user_id, conversation.id)
            .await
            .unwrap()
            .messages;
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn test_file_turns_bypass_the_cache() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Agentic, None, None, None)
            .await
            .unwrap();

        let reply = json!({
            "document_id": "doc-1",
            "agent_response": "Summary.",
            "session_id": "s-1",
        });
        f.backend.script(reply.clone());
        f.backend.script(reply);

        for _ in 0..2 {
            f.service
                .send_message(
                    f.user_id,
                    conversation.id,
                    "Summarize this",
                    Mode::Agentic,
                    Some(upload("lease.pdf")),
                    LanguageHints::default(),
                )
                .await
                .unwrap();
        }

        // Same message twice, but file-bearing turns always go live.
        assert_eq!(f.backend.calls().len(), 2);
    }

    // ---- Session continuity ----

    #[tokio::test]
    async fn test_session_id_threads_to_next_turn() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Agentic, None, None, None)
            .await
            .unwrap();

        f.backend
            .script(json!({ "response": "First.", "session_id": "sess-1" }));
        f.backend
            .script(json!({ "response": "Second.", "session_id": "sess-1" }));

        let first = f
            .service
            .send_message(
                f.user_id,
                conversation.id,
                "start",
                Mode::Agentic,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();
        assert_eq!(first.conversation.session_id.as_deref(), Some("sess-1"));

        f.service
            .send_message(
                f.user_id,
                conversation.id,
                "continue",
                Mode::Agentic,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();

        let calls = f.backend.calls();
        assert_eq!(
            calls[0],
            Call::AgentChat {
                session_id: None,
                document_id: None
            }
        );
        // The session issued on turn one is passed on turn two.
        assert_eq!(
            calls[1],
            Call::AgentChat {
                session_id: Some("sess-1".to_string()),
                document_id: None
            }
        );
    }

    #[tokio::test]
    async fn test_changed_session_id_is_persisted() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(
                f.user_id,
                None,
                Mode::Agentic,
                None,
                None,
                Some("old-session".to_string()),
            )
            .await
            .unwrap();

        f.backend
            .script(json!({ "response": "ok", "session_id": "new-session" }));
        f.service
            .send_message(
                f.user_id,
                conversation.id,
                "hello",
                Mode::Agentic,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();

        let info = f
            .service
            .get_conversation_info(f.user_id, conversation.id)
            .await
            .unwrap();
        assert_eq!(info.session_id.as_deref(), Some("new-session"));
    }

    // ---- Document binding ----

    #[tokio::test]
    async fn test_upload_binds_document_and_routes_follow_ups() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Agentic, None, None, None)
            .await
            .unwrap();

        f.backend.script(json!({
            "document_id": "doc-55",
            "agent_response": "Read the lease.",
            "session_id": "sess-55",
        }));
        let outcome = f
            .service
            .send_message(
                f.user_id,
                conversation.id,
                "Analyze this lease",
                Mode::Agentic,
                Some(upload("lease.pdf")),
                LanguageHints::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.conversation.document_id.as_deref(), Some("doc-55"));

        let info = f
            .service
            .get_conversation_info(f.user_id, conversation.id)
            .await
            .unwrap();
        assert_eq!(info.document_id.as_deref(), Some("doc-55"));
        assert_eq!(info.document_name.as_deref(), Some("lease.pdf"));
        assert_eq!(info.session_id.as_deref(), Some("sess-55"));

        // A file-less follow-up routes through the existing-document branch.
        f.backend
            .script(json!({ "response": "Clause 4 says...", "session_id": "sess-55" }));
        f.service
            .send_message(
                f.user_id,
                conversation.id,
                "What does clause 4 say?",
                Mode::Agentic,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();

        let calls = f.backend.calls();
        assert_eq!(
            calls[1],
            Call::AgentChat {
                session_id: Some("sess-55".to_string()),
                document_id: Some("doc-55".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_upload_passes_existing_session_for_continuity() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(
                f.user_id,
                None,
                Mode::Agentic,
                None,
                None,
                Some("sess-old".to_string()),
            )
            .await
            .unwrap();

        f.backend.script(json!({
            "document_id": "doc-2",
            "agent_response": "ok",
        }));
        f.service
            .send_message(
                f.user_id,
                conversation.id,
                "another document",
                Mode::Agentic,
                Some(upload("addendum.pdf")),
                LanguageHints::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            f.backend.calls()[0],
            Call::Upload {
                file_name: "addendum.pdf".to_string(),
                session_id: Some("sess-old".to_string()),
            }
        );
        // No session in the reply: the old one must survive.
        let info = f
            .service
            .get_conversation_info(f.user_id, conversation.id)
            .await
            .unwrap();
        assert_eq!(info.session_id.as_deref(), Some("sess-old"));
        assert_eq!(info.document_id.as_deref(), Some("doc-2"));
    }

    // ---- Degraded replies ----

    #[tokio::test]
    async fn test_malformed_reply_yields_placeholder() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Agentic, None, None, None)
            .await
            .unwrap();

        f.backend.script(json!({ "session_id": "s", "unexpected": true }));
        let outcome = f
            .service
            .send_message(
                f.user_id,
                conversation.id,
                "hello?",
                Mode::Agentic,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.message.content, PLACEHOLDER_TEXT);
    }

    #[tokio::test]
    async fn test_assistant_metadata_carries_tool_summary() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Agentic, None, None, None)
            .await
            .unwrap();

        f.backend.script(json!({
            "response": "Found it.",
            "session_id": "s",
            "intermediate_steps": [
                { "tool": "vector_search",
                  "result": { "query_time": 12.3, "chunks_used": 3, "total_chunks": 90 } }
            ],
        }));
        let outcome = f
            .service
            .send_message(
                f.user_id,
                conversation.id,
                "find the clause",
                Mode::Agentic,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();

        let metadata = outcome.message.metadata;
        assert_eq!(metadata.tools_used.len(), 1);
        assert_eq!(metadata.tools_used[0].tool, "vector_search");
        assert_eq!(metadata.total_query_time_ms, Some(12.3));
        assert_eq!(metadata.total_chunks, Some(90));
    }

    // ---- Listings ----

    #[tokio::test]
    async fn test_get_conversations_annotates_latest_message() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Normal, None, None, None)
            .await
            .unwrap();

        f.backend.script(json!({ "response": "First answer." }));
        f.service
            .send_message(
                f.user_id,
                conversation.id,
                "first question",
                Mode::Normal,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();

        let listings = f.service.get_conversations(f.user_id).await.unwrap();
        assert_eq!(listings.len(), 1);
        let last = listings[0].last_message.as_ref().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "First answer.");
    }

    #[tokio::test]
    async fn test_list_cache_invalidated_by_send() {
        let f = fixture();
        let conversation = f
            .service
            .create_conversation(f.user_id, None, Mode::Normal, None, None, None)
            .await
            .unwrap();

        // Prime the list cache.
        let before = f.service.get_conversations(f.user_id).await.unwrap();
        assert!(before[0].last_message.is_none());

        f.backend.script(json!({ "response": "Fresh answer." }));
        f.service
            .send_message(
                f.user_id,
                conversation.id,
                "question",
                Mode::Normal,
                None,
                LanguageHints::default(),
            )
            .await
            .unwrap();

        // The mutation dropped the cached listing.
        let after = f.service.get_conversations(f.user_id).await.unwrap();
        assert_eq!(
            after[0].last_message.as_ref().unwrap().content,
            "Fresh answer."
        );
    }

    #[tokio::test]
    async fn test_delete_all_returns_count() {
        let f = fixture();
        for _ in 0..3 {
            f.service
                .create_conversation(f.user_id, None, Mode::Normal, None, None, None)
                .await
                .unwrap();
        }
        assert_eq!(f.service.delete_all_conversations(f.user_id).await.unwrap(), 3);
        assert!(f.service.get_conversations(f.user_id).await.unwrap().is_empty());
    }
}
