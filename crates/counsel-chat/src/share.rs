//! Public sharing of conversations.
//!
//! Capability-style access control: possession of the unguessable token
//! is the only credential. A conversation has at most one active link
//! (find-or-create), and disabling is a hard revoke that deletes the
//! link rows, so previously distributed URLs become permanently invalid.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use counsel_core::types::SharedLink;
use counsel_storage::{
    ConversationRepository, Database, MessageRepository, SharedLinkRepository, UserRepository,
};

use crate::error::ChatError;
use crate::types::{ShareLinkView, SharedConversationView, SharedMessageView};

/// Generate a random 32-character hex share token.
fn generate_share_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Enables, revokes, and resolves public share links.
pub struct SharingService {
    conversations: ConversationRepository,
    messages: MessageRepository,
    links: SharedLinkRepository,
    users: UserRepository,
}

impl SharingService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            conversations: ConversationRepository::new(Arc::clone(&db)),
            messages: MessageRepository::new(Arc::clone(&db)),
            links: SharedLinkRepository::new(Arc::clone(&db)),
            users: UserRepository::new(db),
        }
    }

    /// Enable sharing for a conversation.
    ///
    /// Idempotent: the existing link is returned when one is already
    /// active. Also flips the user-level kill-switch back on.
    pub async fn enable_share(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<ShareLinkView, ChatError> {
        let conversation = self
            .conversations
            .find_for_user(conversation_id, user_id)?
            .ok_or(ChatError::ConversationNotFound)?;

        let link = match self.links.find_for_conversation(user_id, conversation_id)? {
            Some(existing) => existing,
            None => {
                let link = SharedLink {
                    id: Uuid::new_v4(),
                    token: generate_share_token(),
                    user_id,
                    conversation_id,
                    view_count: 0,
                    max_views: None,
                    expires_at: None,
                    created_at: Utc::now(),
                };
                self.links.insert(&link)?;
                info!(conversation_id = %conversation_id, "Share link created");
                link
            }
        };

        if !conversation.is_shared {
            self.conversations.set_shared(conversation_id, true)?;
        }
        self.users.set_share_enabled(user_id, true)?;

        Ok(ShareLinkView {
            token: link.token,
            conversation_id,
            view_count: link.view_count,
            max_views: link.max_views,
            expires_at: link.expires_at,
        })
    }

    /// Revoke sharing for a conversation.
    ///
    /// A no-op success when the conversation is already private.
    pub async fn disable_share(
        &self,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<(), ChatError> {
        self.conversations
            .find_for_user(conversation_id, user_id)?
            .ok_or(ChatError::ConversationNotFound)?;

        self.conversations.set_shared(conversation_id, false)?;
        let revoked = self.links.delete_for_conversation(conversation_id)?;
        if revoked > 0 {
            info!(conversation_id = %conversation_id, revoked, "Share links revoked");
        }
        Ok(())
    }

    /// Resolve a share token into a public conversation snapshot.
    ///
    /// No ownership check; validation fails fast in a fixed order, each
    /// stage with its own reason. A successful resolve counts as a view.
    pub async fn resolve_shared_link(
        &self,
        token: &str,
    ) -> Result<SharedConversationView, ChatError> {
        let link = self
            .links
            .find_by_token(token)?
            .ok_or(ChatError::LinkNotFound)?;

        let owner = self
            .users
            .find_by_id(link.user_id)?
            .ok_or(ChatError::LinkNotFound)?;
        if !owner.share_enabled {
            return Err(ChatError::LinkForbidden(
                "sharing is disabled for this user".to_string(),
            ));
        }

        let conversation = self
            .conversations
            .find_by_id(link.conversation_id)?
            .ok_or(ChatError::ConversationNotFound)?;
        if !conversation.is_shared {
            return Err(ChatError::LinkForbidden(
                "this conversation is no longer shared".to_string(),
            ));
        }

        if let Some(expires_at) = link.expires_at {
            if Utc::now() > expires_at {
                return Err(ChatError::LinkForbidden("this link has expired".to_string()));
            }
        }

        if let Some(max_views) = link.max_views {
            if link.view_count >= max_views {
                return Err(ChatError::LinkForbidden(
                    "this link has reached its view limit".to_string(),
                ));
            }
        }

        let view_count = self.links.increment_views(link.id)?;
        let messages = self
            .messages
            .list_for_conversation(conversation.id)?
            .into_iter()
            .map(SharedMessageView::from)
            .collect();

        Ok(SharedConversationView {
            id: conversation.id,
            title: conversation.title,
            mode: conversation.mode,
            created_at: conversation.created_at,
            view_count,
            messages,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
