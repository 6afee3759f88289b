//! Push notifications.
//!
//! [`PushClient`] posts to the notify endpoint, which fans the request out to
//! the push gateway.  [`PushNotifier`] plays the part of a message-created
//! trigger: it watches the remote store for new messages and notifies every
//! other participant.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use messageai_shared::constants::PUSH_PREVIEW_CHARS;
use messageai_shared::protocol::{MessageDoc, PushRequest, PushResponse};
use messageai_shared::types::MessageKind;

use crate::error::PushError;
use crate::remote::{RemoteEvent, RemoteStore};

pub struct PushClient {
    http: reqwest::Client,
    endpoint: String,
}

impl PushClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub async fn send(&self, request: &PushRequest) -> Result<PushResponse, PushError> {
        if request.push_tokens.is_empty() {
            return Err(PushError::NoRecipients);
        }

        let resp = self.http.post(&self.endpoint).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PushError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let result: PushResponse = resp.json().await?;
        debug!(sent = result.sent, failed = result.failed, "push dispatched");
        Ok(result)
    }
}

/// Notification announcing `message` to `push_tokens`.
pub fn new_message_notification(
    push_tokens: Vec<String>,
    message: &MessageDoc,
    group_name: Option<&str>,
) -> PushRequest {
    let title = match group_name {
        Some(group) => format!("{} in {group}", message.sender_name),
        None => message.sender_name.clone(),
    };
    let body = match message.kind {
        MessageKind::Image if message.text.trim().is_empty() => "📷 Image".to_string(),
        _ => preview(&message.text, PUSH_PREVIEW_CHARS),
    };
    PushRequest {
        push_tokens,
        title,
        body,
        data: json!({
            "type": "new_message",
            "conversationId": message.conversation_id,
            "messageId": message.id,
        }),
    }
}

/// First `max` characters of `text`, with an ellipsis if anything was cut.
fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push('…');
    cut
}

/// Sends a notification for every message added to the remote store.
pub struct PushNotifier {
    remote: Arc<dyn RemoteStore>,
    push: Arc<PushClient>,
}

impl PushNotifier {
    pub fn new(remote: Arc<dyn RemoteStore>, push: Arc<PushClient>) -> Self {
        Self { remote, push }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        let mut rx = self.remote.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(RemoteEvent::MessageAdded(message)) => {
                        if let Err(e) = self.notify(&message).await {
                            warn!(message_id = %message.id, error = %e, "push notification failed");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "push notifier lagged behind remote events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Notify every participant except the sender.  Participants without a
    /// push token are skipped.
    pub async fn notify(&self, message: &MessageDoc) -> Result<Option<PushResponse>, PushError> {
        let conversation = match self.remote.get_conversation(&message.conversation_id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                debug!(conversation_id = %message.conversation_id, "conversation missing, no push");
                return Ok(None);
            }
            Err(e) => {
                warn!(conversation_id = %message.conversation_id, error = %e, "cannot load conversation for push");
                return Ok(None);
            }
        };

        let recipients = conversation
            .participants
            .iter()
            .filter(|uid| **uid != message.sender_id);
        let profiles = join_all(recipients.map(|uid| self.remote.get_user(uid))).await;

        let mut seen = HashSet::new();
        let tokens: Vec<String> = profiles
            .into_iter()
            .filter_map(|r| r.ok().flatten())
            .filter_map(|profile| profile.push_token)
            .filter(|token| !token.is_empty() && seen.insert(token.clone()))
            .collect();
        if tokens.is_empty() {
            debug!(message_id = %message.id, "no push tokens for recipients");
            return Ok(None);
        }

        let group_name = conversation
            .is_group
            .then_some(conversation.group_name.as_deref())
            .flatten();
        let request = new_message_notification(tokens, message, group_name);
        let response = self.push.send(&request).await?;
        info!(message_id = %message.id, sent = response.sent, "recipients notified");
        Ok(Some(response))
    }
}
