//! Counsel chat crate - the conversation orchestration engine.
//!
//! Decides, for each incoming user message, which backend call to make,
//! interprets the classified reply, threads session/document affinity
//! across turns, and keeps the response cache coherent with persisted
//! state. Also hosts the sharing subsystem and the translation and
//! document-generation services that ride on the same collaborators.

pub mod cache_gate;
pub mod conversation;
pub mod document;
pub mod error;
pub mod share;
pub mod translation;
pub mod types;

pub use cache_gate::ResponseCacheGate;
pub use conversation::ConversationService;
pub use document::DocumentService;
pub use error::ChatError;
pub use share::SharingService;
pub use translation::TranslationService;
pub use types::{
    AssistantMessageView, ConversationAffinity, ConversationInfo, ConversationListing,
    ConversationWithMessages, DocumentListing, LanguageDetection, LanguageHints,
    SendMessageOutcome, ShareLinkView, SharedConversationView, SharedMessageView,
    TranslationResult, UploadedFile,
};
