//! Counsel backend crate - HTTP collaborator for the AI inference service.
//!
//! Provides the `AiBackend` trait (the seam the orchestrator is tested
//! through), the reqwest-based `BackendClient`, and reply classification:
//! the loosely-typed JSON the service returns is sniffed exactly once at
//! the call boundary and turned into a tagged `BackendReply` variant.

pub mod client;
pub mod error;
pub mod reply;

pub use client::{AiBackend, BackendClient};
pub use error::BackendError;
pub use reply::{
    AgentChatReply, BackendReply, IntermediateStep, PlainChatReply, ToolSummary,
    UploadAndChatReply, PLACEHOLDER_TEXT,
};
