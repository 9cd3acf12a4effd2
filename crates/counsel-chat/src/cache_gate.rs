//! Content-addressed gate in front of the AI backend.
//!
//! Stores raw replies keyed by (message, mode) so that repeated identical
//! non-file queries are answered without a live call. The gate is strictly
//! advisory: every failure path here is absorbed and logged, and a corrupt
//! entry is proactively deleted and treated as a miss.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use counsel_cache::{ai_response_key, CacheStore};
use counsel_core::types::Mode;

/// Legacy corrupt sentinel: a stringified object rather than its JSON.
const CORRUPT_PREFIX: &str = "[object";

/// Lookup/store for cached AI replies.
pub struct ResponseCacheGate {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ResponseCacheGate {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Look up a cached reply for (message, mode).
    ///
    /// Returns the raw reply value on a hit. Undeserializable or
    /// sentinel-corrupt entries are deleted and reported as a miss.
    pub async fn lookup(&self, message: &str, mode: Mode) -> Option<Value> {
        let key = ai_response_key(message, mode.as_str());

        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Cache read failed; treating as miss");
                return None;
            }
        };

        if raw.starts_with(CORRUPT_PREFIX) {
            warn!(key = %key, "Corrupt cache entry detected; purging");
            let _ = self.store.delete(&key).await;
            return None;
        }

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %key, "AI response cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Unparseable cache entry; purging");
                let _ = self.store.delete(&key).await;
                None
            }
        }
    }

    /// Store a raw reply. Best-effort: failures are logged and swallowed.
    pub async fn store(&self, message: &str, mode: Mode, reply: &Value) {
        let key = ai_response_key(message, mode.as_str());
        let serialized = match serde_json::to_string(reply) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Failed to serialize reply for caching");
                return;
            }
        };
        if let Err(e) = self.store.set(&key, &serialized, self.ttl).await {
            warn!(error = %e, "Cache write failed; continuing without caching");
        }
    }
}
