//! Translation service: cache-first proxying of the translate and
//! detect-language backend operations, with a persisted history.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use counsel_backend::AiBackend;
use counsel_cache::{translation_key, CacheStore};
use counsel_core::config::CacheConfig;
use counsel_core::types::Translation;
use counsel_storage::{Database, TranslationRepository};

use crate::error::ChatError;
use crate::types::{LanguageDetection, TranslationResult};

/// Most recent history entries returned per user.
const HISTORY_LIMIT: u64 = 50;

pub struct TranslationService {
    translations: TranslationRepository,
    backend: Arc<dyn AiBackend>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl TranslationService {
    pub fn new(
        db: Arc<Database>,
        backend: Arc<dyn AiBackend>,
        cache: Arc<dyn CacheStore>,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            translations: TranslationRepository::new(db),
            backend,
            cache,
            ttl: Duration::from_secs(cache_config.translation_ttl_secs),
        }
    }

    /// Translate text, serving repeats from the cache.
    ///
    /// Cache hits return without a backend call and without writing a
    /// history row, so history only records live translations.
    pub async fn translate(
        &self,
        user_id: Uuid,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslationResult, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::Validation("text cannot be empty".to_string()));
        }

        let key = translation_key(text, source_lang, target_lang);
        match self.cache.get(&key).await {
            Ok(Some(cached)) => {
                debug!("Translation served from cache");
                return Ok(TranslationResult {
                    source_text: text.to_string(),
                    translated_text: cached,
                    source_lang: source_lang.to_string(),
                    target_lang: target_lang.to_string(),
                    cached: true,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Translation cache read failed; calling backend"),
        }

        let result = self.backend.translate(text, source_lang, target_lang).await?;
        let translated_text = result
            .get("translated_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if translated_text.is_empty() {
            return Err(ChatError::Upstream(
                "translation failed: no translated text returned".to_string(),
            ));
        }

        self.translations.insert(&Translation {
            id: Uuid::new_v4(),
            user_id,
            source_text: text.to_string(),
            translated_text: translated_text.clone(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            created_at: Utc::now(),
        })?;

        if let Err(e) = self.cache.set(&key, &translated_text, self.ttl).await {
            warn!(error = %e, "Failed to cache translation");
        }

        Ok(TranslationResult {
            source_text: text.to_string(),
            translated_text,
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            cached: false,
        })
    }

    /// Detect the language of a text sample.
    pub async fn detect_language(&self, text: &str) -> Result<LanguageDetection, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::Validation("text cannot be empty".to_string()));
        }

        let result = self.backend.detect_language(text).await?;
        Ok(LanguageDetection {
            language: result
                .get("language")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            confidence: result.get("confidence").and_then(Value::as_f64),
        })
    }

    /// Recent translation history for a user, newest first.
    pub async fn get_user_translations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Translation>, ChatError> {
        Ok(self.translations.list_recent_for_user(user_id, HISTORY_LIMIT)?)
    }
}
