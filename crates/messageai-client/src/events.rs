//! Change notifications for the UI layer.
//!
//! Services publish a [`ClientEvent`] whenever they change what the user
//! sees.  The UI holds a receiver from [`EventBus::subscribe`]; dropping it
//! unsubscribes.

use tokio::sync::broadcast;
use tracing::trace;

use messageai_store::{Conversation, Message};

use crate::sync::SyncReport;

const EVENT_CAPACITY: usize = 512;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A message was written to the local cache (optimistic placeholder,
    /// status change, or a document pulled from the remote store).
    MessageUpdated(Message),

    /// A placeholder was confirmed by the remote store and now lives under
    /// its remote id.
    MessageConfirmed { local_id: String, message: Message },

    MessageFailed { id: String, error: String },

    ConversationUpdated(Conversation),

    TypingChanged {
        conversation_id: String,
        uid: String,
        typing: bool,
    },

    SyncCompleted(SyncReport),

    ConnectivityChanged { online: bool },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            trace!("no event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
