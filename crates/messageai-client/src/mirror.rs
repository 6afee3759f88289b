//! Writes remote change events through to the local cache.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use messageai_store::{Conversation, Message};

use crate::cache::LocalCache;
use crate::events::{ClientEvent, EventBus};
use crate::remote::{RemoteEvent, RemoteStore};

pub struct RemoteMirror {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<LocalCache>,
    events: EventBus,
}

impl RemoteMirror {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<LocalCache>, events: EventBus) -> Self {
        Self {
            remote,
            cache,
            events,
        }
    }

    /// Apply remote events until the remote store drops its sender.
    pub fn spawn(self) -> JoinHandle<()> {
        let mut rx = self.remote.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.apply(event),
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed events are picked up by the next full read.
                        warn!(skipped, "remote mirror lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("remote event stream closed");
        })
    }

    pub fn apply(&self, event: RemoteEvent) {
        match event {
            RemoteEvent::MessageAdded(doc) => {
                if let Some(client_id) = doc.client_id.as_deref() {
                    if client_id != doc.id && self.cache.confirm_message(client_id, &doc.id) {
                        debug!(local_id = client_id, remote_id = %doc.id, "placeholder confirmed by remote event");
                    }
                }
                let message = Message::from(doc);
                self.cache.save_message(&message);
                self.events.emit(ClientEvent::MessageUpdated(message));
            }
            RemoteEvent::MessageStatusChanged {
                message_id, status, ..
            } => {
                if self.cache.update_status(&message_id, status) {
                    if let Some(message) = self.cache.get_message(&message_id) {
                        self.events.emit(ClientEvent::MessageUpdated(message));
                    }
                }
            }
            RemoteEvent::ConversationChanged(doc) => {
                let conversation = Conversation::from(doc);
                self.cache.save_conversation(&conversation);
                self.events
                    .emit(ClientEvent::ConversationUpdated(conversation));
            }
            RemoteEvent::TypingChanged {
                conversation_id,
                uid,
                typing,
            } => {
                self.events.emit(ClientEvent::TypingChanged {
                    conversation_id,
                    uid,
                    typing,
                });
            }
        }
    }
}
