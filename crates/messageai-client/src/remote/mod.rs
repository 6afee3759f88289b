//! The authoritative remote document store.
//!
//! [`RemoteStore`] is the seam between the client services and whatever
//! cloud document database backs them.  It covers the `messages`,
//! `conversations`, `users` and `typing` collections: point reads, filtered
//! collection queries, writes, and a broadcast stream of change events that
//! stands in for real-time listeners.

mod memory;

pub use memory::MemoryRemote;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;

use messageai_shared::protocol::{
    ConversationDoc, LastMessage, MessageDoc, NewMessage, UserProfile,
};
use messageai_shared::types::MessageStatus;

/// Errors reported by a remote store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No connectivity, or the backend did not answer.
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The backend refused the write (validation, quota, ...).
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Change pushed by the remote store to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    MessageAdded(MessageDoc),
    MessageStatusChanged {
        message_id: String,
        conversation_id: String,
        status: MessageStatus,
    },
    ConversationChanged(ConversationDoc),
    TypingChanged {
        conversation_id: String,
        uid: String,
        typing: bool,
    },
}

#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Write a message and return its remote id.  Writing the same
    /// `client_id` twice returns the id assigned the first time.
    async fn add_message(&self, message: &NewMessage) -> Result<String, RemoteError>;

    async fn update_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), RemoteError>;

    /// Messages of one conversation, oldest first.
    async fn messages_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<MessageDoc>, RemoteError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<ConversationDoc>, RemoteError>;

    /// The non-group conversation whose participants are exactly `a` and `b`.
    async fn find_direct_conversation(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<ConversationDoc>, RemoteError>;

    /// Create `doc` unless a conversation with the same id exists; either way
    /// the stored document is returned.
    async fn create_conversation(
        &self,
        doc: &ConversationDoc,
    ) -> Result<ConversationDoc, RemoteError>;

    async fn update_last_message(
        &self,
        conversation_id: &str,
        last: &LastMessage,
    ) -> Result<(), RemoteError>;

    /// Conversations `uid` participates in, most recent activity first.
    async fn conversations_for_user(&self, uid: &str) -> Result<Vec<ConversationDoc>, RemoteError>;

    async fn mark_read(
        &self,
        conversation_id: &str,
        uid: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RemoteError>;

    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, RemoteError>;

    async fn set_typing(
        &self,
        conversation_id: &str,
        uid: &str,
        typing: bool,
    ) -> Result<(), RemoteError>;

    /// Subscribe to change events.  Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<RemoteEvent>;
}
