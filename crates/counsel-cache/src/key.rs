//! Content-addressed cache key construction.
//!
//! Keys are namespaced by record kind. Content-addressed keys use the
//! first 16 hex chars of a SHA-256 over the JSON encoding of the inputs,
//! so distinct texts collide only at cryptographic-hash probability.

use sha2::{Digest, Sha256};

/// First 16 hex characters of SHA-256 over the JSON array of parts.
fn hash16(parts: &[&str]) -> String {
    let encoded = serde_json::to_string(parts).unwrap_or_default();
    let digest = Sha256::digest(encoded.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Key for a cached AI reply: `ai:{hash(query, mode)}`.
pub fn ai_response_key(query: &str, mode: &str) -> String {
    format!("ai:{}", hash16(&[query, mode]))
}

/// Key for a cached translation: `translation:{hash(text, src, tgt)}`.
pub fn translation_key(text: &str, source_lang: &str, target_lang: &str) -> String {
    format!("translation:{}", hash16(&[text, source_lang, target_lang]))
}

/// Key for a user's cached conversation listing: `user:{userId}`.
pub fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}

/// Key for a cached conversation snapshot: `conversation:{conversationId}`.
pub fn conversation_key(conversation_id: &str) -> String {
    format!("conversation:{}", conversation_id)
}
