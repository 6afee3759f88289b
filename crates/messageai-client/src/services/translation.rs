use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};

use messageai_shared::constants::TRANSLATION_CACHE_TTL_SECS;
use messageai_shared::AiError;
use messageai_store::CachedTranslation;

use crate::cache::LocalCache;
use crate::services::ai::AiClient;

/// Message translation memoized per (message, target language).
pub struct TranslationService {
    ai: Arc<AiClient>,
    cache: Arc<LocalCache>,
}

impl TranslationService {
    pub fn new(ai: Arc<AiClient>, cache: Arc<LocalCache>) -> Self {
        Self { ai, cache }
    }

    /// Translation of `text` (the body of `message_id`) into
    /// `target_language`, from the cache when one exists.
    pub async fn translate_message(
        &self,
        message_id: &str,
        text: &str,
        target_language: &str,
    ) -> Result<CachedTranslation, AiError> {
        if let Some(hit) = self.cache.translation(message_id, target_language) {
            if !is_expired(&hit) {
                debug!(message_id, target_language, "translation cache hit");
                return Ok(hit);
            }
        }

        let translation = self.ai.translate(text, target_language).await?;
        let entry = CachedTranslation {
            id: CachedTranslation::cache_key(message_id, target_language),
            message_id: message_id.to_string(),
            source_text: text.to_string(),
            translated_text: translation.translated_text,
            detected_language: translation.detected_language,
            target_language: target_language.to_string(),
            created_at: Utc::now(),
        };
        self.cache.save_translation(&entry);
        Ok(entry)
    }

    /// Drop cached translations older than the retention window.
    pub fn sweep_expired(&self) -> usize {
        let removed = self.cache.purge_translations_before(cutoff());
        if removed > 0 {
            info!(removed, "expired translations purged");
        }
        removed
    }
}

fn cutoff() -> chrono::DateTime<Utc> {
    Utc::now() - Duration::seconds(TRANSLATION_CACHE_TTL_SECS)
}

fn is_expired(entry: &CachedTranslation) -> bool {
    entry.created_at < cutoff()
}
