//! Optimistic message sending.
//!
//! A send writes a placeholder to the local cache and hands it back to the
//! caller before any network traffic.  The remote write runs on its own task
//! under the configured send timeout and resolves the returned
//! [`PendingSend::outcome`] exactly once.
//!
//! Status machine of a locally created message:
//!
//! ```text
//! sending --remote ack--> sent
//! sending --error/timeout--> failed --retry--> sending
//! ```
//!
//! A message sent while offline stays `sending` and unsynced; the sync
//! coordinator delivers it once connectivity returns.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use messageai_shared::constants::MAX_MESSAGE_LENGTH;
use messageai_shared::types::{new_temp_message_id, now_millis, MessageKind, MessageStatus};
use messageai_store::Message;

use crate::cache::LocalCache;
use crate::connectivity::Connectivity;
use crate::error::{MediaError, ServiceError, SendError};
use crate::events::{ClientEvent, EventBus};
use crate::remote::RemoteStore;
use crate::services::media::MediaUploader;
use crate::sync::{confirm_delivery, publish_preview, InFlight, InFlightGuard};

/// Identity stamped on outgoing messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub uid: String,
    pub display_name: String,
}

impl Author {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
        }
    }
}

/// How a send attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SendOutcome {
    /// The remote store acknowledged the message under `remote_id`.
    Sent { remote_id: String },
    /// The remote write failed or timed out; the message is now `failed`.
    Failed { error: String },
    /// Offline: the message waits in the cache for the sync coordinator.
    Queued,
}

/// A send in progress.
pub struct PendingSend {
    /// The optimistic placeholder, already in the cache.
    pub message: Message,
    /// Resolves once the send attempt ends.
    pub outcome: oneshot::Receiver<SendOutcome>,
}

pub struct MessageService {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<LocalCache>,
    connectivity: Connectivity,
    in_flight: InFlight,
    events: EventBus,
    uploader: Option<Arc<MediaUploader>>,
    send_timeout: Duration,
}

impl MessageService {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<LocalCache>,
        connectivity: Connectivity,
        in_flight: InFlight,
        events: EventBus,
        send_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            cache,
            connectivity,
            in_flight,
            events,
            uploader: None,
            send_timeout,
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<MediaUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Send a text message.  Returns as soon as the placeholder is cached.
    pub fn send_text(
        &self,
        conversation_id: &str,
        author: &Author,
        text: &str,
    ) -> Result<PendingSend, SendError> {
        let text = validate_text(text)?;
        let message = optimistic_message(conversation_id, author, text, MessageKind::Text, None);
        self.submit(message)
    }

    /// Upload the image at `path`, then send it as an image message with an
    /// optional caption.
    pub async fn send_image(
        &self,
        conversation_id: &str,
        author: &Author,
        path: &Path,
        caption: &str,
    ) -> Result<PendingSend, SendError> {
        let caption = caption.trim();
        let len = caption.chars().count();
        if len > MAX_MESSAGE_LENGTH {
            return Err(SendError::TooLong {
                len,
                max: MAX_MESSAGE_LENGTH,
            });
        }

        let uploader = self
            .uploader
            .as_ref()
            .ok_or_else(|| MediaError::Invalid("no media uploader configured".into()))?;
        let uploaded = uploader.upload_file(path, "images").await?;

        let message = optimistic_message(
            conversation_id,
            author,
            caption.to_string(),
            MessageKind::Image,
            Some(uploaded.url),
        );
        self.submit(message)
    }

    /// Resend a `failed` message under its existing id.
    pub fn retry(&self, message_id: &str) -> Result<PendingSend, SendError> {
        let message = self
            .cache
            .get_message(message_id)
            .ok_or_else(|| SendError::NotFound(message_id.to_string()))?;
        if message.status != MessageStatus::Failed {
            return Err(SendError::NotRetryable(message.status));
        }
        info!(id = %message_id, "retrying message");
        self.submit(message)
    }

    /// Messages of a conversation, oldest first.
    ///
    /// Remote documents are written through to the cache and merged with the
    /// local messages the remote store has not acknowledged yet.  If the
    /// remote read fails the cached view is returned.
    pub async fn load_messages(&self, conversation_id: &str) -> Vec<Message> {
        let docs = match self.remote.messages_for_conversation(conversation_id).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(conversation_id, error = %e, "remote read failed, using cached messages");
                return self.cache.messages_for_conversation(conversation_id);
            }
        };

        let mut merged: Vec<Message> = Vec::with_capacity(docs.len());
        for doc in docs {
            if let Some(client_id) = doc.client_id.as_deref() {
                if client_id != doc.id && self.cache.confirm_message(client_id, &doc.id) {
                    debug!(local_id = client_id, remote_id = %doc.id, "placeholder confirmed by remote read");
                }
            }
            let message = Message::from(doc);
            self.cache.save_message(&message);
            merged.push(message);
        }

        let pending = self
            .cache
            .messages_for_conversation(conversation_id)
            .into_iter()
            .filter(|m| !m.synced);
        merged.extend(pending);

        merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        merged
    }

    /// Record that `uid` has read `conversation_id` up to now.
    pub async fn mark_read(&self, conversation_id: &str, uid: &str) -> Result<(), ServiceError> {
        let now = now_millis();
        if self.cache.set_read(conversation_id, uid, now) {
            if let Some(conversation) = self.cache.get_conversation(conversation_id) {
                self.events.emit(ClientEvent::ConversationUpdated(conversation));
            }
        }
        self.remote.mark_read(conversation_id, uid, now).await?;
        Ok(())
    }

    /// Cache `message` as `sending` and start delivering it.
    fn submit(&self, mut message: Message) -> Result<PendingSend, SendError> {
        let guard = self
            .in_flight
            .claim(&message.id)
            .ok_or_else(|| SendError::AlreadySending(message.id.clone()))?;

        message.status = MessageStatus::Sending;
        message.synced = false;
        self.cache.save_message(&message);
        self.events.emit(ClientEvent::MessageUpdated(message.clone()));

        let (tx, outcome) = oneshot::channel();
        if self.connectivity.is_online() {
            self.spawn_delivery(message.clone(), guard, tx);
        } else {
            debug!(id = %message.id, "offline, message queued for sync");
            drop(guard);
            let _ = tx.send(SendOutcome::Queued);
        }

        Ok(PendingSend { message, outcome })
    }

    fn spawn_delivery(
        &self,
        message: Message,
        guard: InFlightGuard,
        tx: oneshot::Sender<SendOutcome>,
    ) {
        let remote = Arc::clone(&self.remote);
        let cache = Arc::clone(&self.cache);
        let events = self.events.clone();
        let send_timeout = self.send_timeout;

        tokio::spawn(async move {
            let _guard = guard;
            // Only the write is timed; once acknowledged the send has succeeded.
            let new_message = message.to_new_message();
            let write = remote.add_message(&new_message);
            let remote_id = match tokio::time::timeout(send_timeout, write).await {
                Ok(Ok(remote_id)) => remote_id,
                Ok(Err(e)) => {
                    let error = e.to_string();
                    mark_failed(&cache, &events, &message.id, &error);
                    let _ = tx.send(SendOutcome::Failed { error });
                    return;
                }
                Err(_) => {
                    let error = format!("send timed out after {send_timeout:?}");
                    mark_failed(&cache, &events, &message.id, &error);
                    let _ = tx.send(SendOutcome::Failed { error });
                    return;
                }
            };

            confirm_delivery(&cache, &events, &message, &remote_id);
            // The caller may have dropped the receiver.
            let _ = tx.send(SendOutcome::Sent { remote_id });
            publish_preview(remote.as_ref(), &message).await;
        });
    }
}

fn mark_failed(cache: &LocalCache, events: &EventBus, id: &str, error: &str) {
    warn!(id, error, "message send failed");
    cache.update_status(id, MessageStatus::Failed);
    events.emit(ClientEvent::MessageFailed {
        id: id.to_string(),
        error: error.to_string(),
    });
}

fn validate_text(text: &str) -> Result<String, SendError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SendError::EmptyMessage);
    }
    let len = text.chars().count();
    if len > MAX_MESSAGE_LENGTH {
        return Err(SendError::TooLong {
            len,
            max: MAX_MESSAGE_LENGTH,
        });
    }
    Ok(text.to_string())
}

fn optimistic_message(
    conversation_id: &str,
    author: &Author,
    text: String,
    kind: MessageKind,
    media_url: Option<String>,
) -> Message {
    Message {
        id: new_temp_message_id(),
        conversation_id: conversation_id.to_string(),
        text,
        sender_id: author.uid.clone(),
        sender_name: author.display_name.clone(),
        timestamp: now_millis(),
        status: MessageStatus::Sending,
        kind,
        media_url,
        synced: false,
        is_optimistic: true,
    }
}
