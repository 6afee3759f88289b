//! Chat-completion backed language features.
//!
//! Every call sends one system prompt and one user prompt, asks for a JSON
//! object back, and is bounded by the configured timeout.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use messageai_shared::constants::MAX_SMART_REPLIES;
use messageai_shared::AiError;

use crate::config::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub translated_text: String,
    /// ISO 639-1 code of the source text, if the model reported one.
    #[serde(default)]
    pub detected_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturalContext {
    pub explanation: String,
    #[serde(default)]
    pub cultural_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SlangTerm {
    pub term: String,
    pub meaning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    Casual,
    Neutral,
    Formal,
}

impl Formality {
    fn as_str(&self) -> &'static str {
        match self {
            Formality::Casual => "casual",
            Formality::Neutral => "neutral",
            Formality::Formal => "formal",
        }
    }
}

/// A line of conversation history fed to smart replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLine {
    pub sender_name: String,
    pub text: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct AiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl AiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            &config.ai_base_url,
            config.ai_api_key.clone(),
            &config.ai_model,
            config.ai_timeout,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> Result<Translation, AiError> {
        let text = non_empty(text)?;
        let system = format!(
            "You are a translator. Translate the user's message into {target_language}. \
             Keep tone, emoji and formatting. Respond with JSON: \
             {{\"translatedText\": string, \"detectedLanguage\": ISO 639-1 code}}."
        );
        let translation: Translation = self.complete(&system, text).await?;
        if translation.translated_text.trim().is_empty() {
            return Err(AiError::api("empty translation", true));
        }
        Ok(translation)
    }

    pub async fn cultural_context(&self, text: &str, language: &str) -> Result<CulturalContext, AiError> {
        let text = non_empty(text)?;
        let system = format!(
            "Explain cultural references, idioms and implied meaning in the user's message \
             for a reader whose language is {language}. Respond with JSON: \
             {{\"explanation\": string, \"culturalNotes\": [string]}}."
        );
        self.complete(&system, text).await
    }

    pub async fn explain_slang(&self, text: &str) -> Result<Vec<SlangTerm>, AiError> {
        #[derive(Deserialize)]
        struct Terms {
            #[serde(default)]
            terms: Vec<SlangTerm>,
        }

        let text = non_empty(text)?;
        let system = "Identify slang, abbreviations and informal expressions in the user's \
                      message and explain each. Respond with JSON: \
                      {\"terms\": [{\"term\": string, \"meaning\": string}]}.";
        let terms: Terms = self.complete(system, text).await?;
        Ok(terms.terms)
    }

    pub async fn adjust_formality(&self, text: &str, level: Formality) -> Result<String, AiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Rewritten {
            adjusted_text: String,
        }

        let text = non_empty(text)?;
        let system = format!(
            "Rewrite the user's message in a {} register without changing its meaning or \
             language. Respond with JSON: {{\"adjustedText\": string}}.",
            level.as_str()
        );
        let rewritten: Rewritten = self.complete(&system, text).await?;
        Ok(rewritten.adjusted_text)
    }

    /// Up to three short replies `me` could send next.
    pub async fn smart_replies(&self, history: &[HistoryLine], me: &str) -> Result<Vec<String>, AiError> {
        #[derive(Deserialize)]
        struct Replies {
            #[serde(default)]
            replies: Vec<String>,
        }

        if history.is_empty() {
            return Err(AiError::invalid_input("conversation history is empty"));
        }
        let transcript = history
            .iter()
            .map(|line| format!("{}: {}", line.sender_name, line.text))
            .collect::<Vec<_>>()
            .join("\n");
        let system = format!(
            "Suggest {MAX_SMART_REPLIES} short replies {me} could send next in this \
             conversation, in the language of the conversation. Respond with JSON: \
             {{\"replies\": [string]}}."
        );

        let replies: Replies = self.complete(&system, &transcript).await?;
        Ok(replies
            .replies
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .take(MAX_SMART_REPLIES)
            .collect())
    }

    async fn complete<T: DeserializeOwned>(&self, system: &str, user: &str) -> Result<T, AiError> {
        let content = tokio::time::timeout(self.timeout, self.request(system, user))
            .await
            .map_err(|_| {
                AiError::network(format!("request timed out after {}s", self.timeout.as_secs()))
            })??;

        serde_json::from_str(&content).map_err(|e| {
            warn!(error = %e, "unparseable AI response");
            AiError::api(format!("malformed response: {e}"), true)
        })
    }

    async fn request(&self, system: &str, user: &str) -> Result<String, AiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::api("AI API key not configured", false))?;

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.3,
        });

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "AI endpoint returned an error");
            return Err(AiError::from_status(status.as_u16(), &text));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AiError::api(format!("malformed response: {e}"), true))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::api("response has no content", true))
    }
}

fn non_empty(text: &str) -> Result<&str, AiError> {
    let text = text.trim();
    if text.is_empty() {
        Err(AiError::invalid_input("text is empty"))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use messageai_shared::AiErrorKind;

    use super::*;

    #[tokio::test]
    async fn empty_input_is_rejected_locally() {
        let client = AiClient::new("http://127.0.0.1:1", Some("k".into()), "m", Duration::from_secs(1));
        let err = client.translate("  ", "fr").await.unwrap_err();
        assert_eq!(err.kind, AiErrorKind::InvalidInput);
        assert!(!err.retryable);

        let err = client.smart_replies(&[], "me").await.unwrap_err();
        assert_eq!(err.kind, AiErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn missing_key_is_not_retryable() {
        let client = AiClient::new("http://127.0.0.1:1", None, "m", Duration::from_secs(1));
        assert!(!client.is_configured());
        let err = client.explain_slang("lol").await.unwrap_err();
        assert_eq!(err.kind, AiErrorKind::Api);
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let client = AiClient::new("http://127.0.0.1:1", Some("k".into()), "m", Duration::from_secs(5));
        let err = client.translate("hola", "en").await.unwrap_err();
        assert_eq!(err.kind, AiErrorKind::Network);
        assert!(err.retryable);
    }
}
