//! In-process [`RemoteStore`] backend.
//!
//! Holds every collection in memory behind a tokio `RwLock` and broadcasts
//! change events to subscribers.  It can be marked unreachable, after which
//! every call fails with [`RemoteError::Unavailable`] until it is marked
//! reachable again.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use messageai_shared::protocol::{
    ConversationDoc, LastMessage, MessageDoc, NewMessage, UserProfile,
};
use messageai_shared::types::MessageStatus;

use super::{RemoteError, RemoteEvent, RemoteStore};

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct Collections {
    messages: HashMap<String, MessageDoc>,
    /// client_id -> remote message id
    client_ids: HashMap<String, String>,
    conversations: HashMap<String, ConversationDoc>,
    users: HashMap<String, UserProfile>,
    /// conversation id -> users currently typing
    typing: HashMap<String, HashSet<String>>,
}

pub struct MemoryRemote {
    collections: RwLock<Collections>,
    reachable: AtomicBool,
    events: broadcast::Sender<RemoteEvent>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            collections: RwLock::new(Collections::default()),
            reachable: AtomicBool::new(true),
            events,
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        debug!(reachable, "memory remote reachability changed");
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Insert or replace a user profile.
    pub async fn put_user(&self, profile: UserProfile) {
        self.collections
            .write()
            .await
            .users
            .insert(profile.uid.clone(), profile);
    }

    /// Number of stored message documents.
    pub async fn message_count(&self) -> usize {
        self.collections.read().await.messages.len()
    }

    /// Users currently typing in a conversation.
    pub async fn typing_users(&self, conversation_id: &str) -> Vec<String> {
        let collections = self.collections.read().await;
        let mut users: Vec<String> = collections
            .typing
            .get(conversation_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        users.sort();
        users
    }

    fn ensure_reachable(&self) -> Result<(), RemoteError> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("remote store unreachable".into()))
        }
    }

    fn publish(&self, event: RemoteEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn add_message(&self, message: &NewMessage) -> Result<String, RemoteError> {
        self.ensure_reachable()?;

        let doc = {
            let mut collections = self.collections.write().await;
            if let Some(existing) = collections.client_ids.get(&message.client_id) {
                debug!(client_id = %message.client_id, id = %existing, "duplicate write resolved to existing message");
                return Ok(existing.clone());
            }

            let id = Uuid::new_v4().to_string();
            let doc = MessageDoc {
                id: id.clone(),
                conversation_id: message.conversation_id.clone(),
                client_id: Some(message.client_id.clone()),
                text: message.text.clone(),
                sender_id: message.sender_id.clone(),
                sender_name: message.sender_name.clone(),
                timestamp: message.timestamp,
                status: MessageStatus::Sent,
                kind: message.kind,
                media_url: message.media_url.clone(),
            };
            collections
                .client_ids
                .insert(message.client_id.clone(), id.clone());
            collections.messages.insert(id, doc.clone());
            doc
        };

        let id = doc.id.clone();
        self.publish(RemoteEvent::MessageAdded(doc));
        Ok(id)
    }

    async fn update_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), RemoteError> {
        self.ensure_reachable()?;

        let conversation_id = {
            let mut collections = self.collections.write().await;
            let doc = collections
                .messages
                .get_mut(message_id)
                .ok_or_else(|| RemoteError::NotFound(format!("messages/{message_id}")))?;
            doc.status = status;
            doc.conversation_id.clone()
        };

        self.publish(RemoteEvent::MessageStatusChanged {
            message_id: message_id.to_string(),
            conversation_id,
            status,
        });
        Ok(())
    }

    async fn messages_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<MessageDoc>, RemoteError> {
        self.ensure_reachable()?;

        let collections = self.collections.read().await;
        let mut docs: Vec<MessageDoc> = collections
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(docs)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<ConversationDoc>, RemoteError> {
        self.ensure_reachable()?;
        Ok(self.collections.read().await.conversations.get(id).cloned())
    }

    async fn find_direct_conversation(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<ConversationDoc>, RemoteError> {
        self.ensure_reachable()?;

        let collections = self.collections.read().await;
        let found = collections
            .conversations
            .values()
            .filter(|c| !c.is_group && c.has_participant(a))
            .find(|c| c.has_participant(b) && c.participants.len() == 2)
            .cloned();
        Ok(found)
    }

    async fn create_conversation(
        &self,
        doc: &ConversationDoc,
    ) -> Result<ConversationDoc, RemoteError> {
        self.ensure_reachable()?;

        if doc.participants.is_empty() {
            return Err(RemoteError::Rejected(
                "conversation has no participants".into(),
            ));
        }

        let (stored, created) = {
            let mut collections = self.collections.write().await;
            match collections.conversations.get(&doc.id) {
                Some(existing) => (existing.clone(), false),
                None => {
                    collections
                        .conversations
                        .insert(doc.id.clone(), doc.clone());
                    (doc.clone(), true)
                }
            }
        };

        if created {
            self.publish(RemoteEvent::ConversationChanged(stored.clone()));
        }
        Ok(stored)
    }

    async fn update_last_message(
        &self,
        conversation_id: &str,
        last: &LastMessage,
    ) -> Result<(), RemoteError> {
        self.ensure_reachable()?;

        let updated = {
            let mut collections = self.collections.write().await;
            let conversation = collections
                .conversations
                .get_mut(conversation_id)
                .ok_or_else(|| RemoteError::NotFound(format!("conversations/{conversation_id}")))?;
            if conversation.last_activity > last.timestamp {
                None
            } else {
                conversation.last_message = Some(last.clone());
                conversation.last_activity = last.timestamp;
                Some(conversation.clone())
            }
        };

        if let Some(conversation) = updated {
            self.publish(RemoteEvent::ConversationChanged(conversation));
        }
        Ok(())
    }

    async fn conversations_for_user(&self, uid: &str) -> Result<Vec<ConversationDoc>, RemoteError> {
        self.ensure_reachable()?;

        let collections = self.collections.read().await;
        let mut docs: Vec<ConversationDoc> = collections
            .conversations
            .values()
            .filter(|c| c.has_participant(uid))
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(docs)
    }

    async fn mark_read(
        &self,
        conversation_id: &str,
        uid: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RemoteError> {
        self.ensure_reachable()?;

        let updated = {
            let mut collections = self.collections.write().await;
            let conversation = collections
                .conversations
                .get_mut(conversation_id)
                .ok_or_else(|| RemoteError::NotFound(format!("conversations/{conversation_id}")))?;
            if !conversation.has_participant(uid) {
                return Err(RemoteError::PermissionDenied(format!(
                    "{uid} is not a participant of {conversation_id}"
                )));
            }
            conversation.read_status.insert(uid.to_string(), at);
            conversation.clone()
        };

        self.publish(RemoteEvent::ConversationChanged(updated));
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, RemoteError> {
        self.ensure_reachable()?;
        Ok(self.collections.read().await.users.get(uid).cloned())
    }

    async fn set_typing(
        &self,
        conversation_id: &str,
        uid: &str,
        typing: bool,
    ) -> Result<(), RemoteError> {
        self.ensure_reachable()?;

        let changed = {
            let mut collections = self.collections.write().await;
            let entry = collections
                .typing
                .entry(conversation_id.to_string())
                .or_default();
            if typing {
                entry.insert(uid.to_string())
            } else {
                entry.remove(uid)
            }
        };

        if changed {
            self.publish(RemoteEvent::TypingChanged {
                conversation_id: conversation_id.to_string(),
                uid: uid.to_string(),
                typing,
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RemoteEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use messageai_shared::types::MessageKind;

    use super::*;

    fn new_message(client_id: &str) -> NewMessage {
        NewMessage {
            client_id: client_id.to_string(),
            conversation_id: "c1".into(),
            text: "hello".into(),
            sender_id: "alice".into(),
            sender_name: "Alice".into(),
            timestamp: Utc::now(),
            kind: MessageKind::Text,
            media_url: None,
        }
    }

    #[tokio::test]
    async fn add_message_is_idempotent_per_client_id() {
        let remote = MemoryRemote::new();
        let first = remote.add_message(&new_message("temp_1")).await.unwrap();
        let again = remote.add_message(&new_message("temp_1")).await.unwrap();
        let other = remote.add_message(&new_message("temp_2")).await.unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(remote.message_count().await, 2);
    }

    #[tokio::test]
    async fn unreachable_remote_rejects_calls() {
        let remote = MemoryRemote::new();
        remote.set_reachable(false);
        let err = remote.add_message(&new_message("temp_1")).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));

        remote.set_reachable(true);
        assert!(remote.add_message(&new_message("temp_1")).await.is_ok());
    }

    #[tokio::test]
    async fn subscribers_see_added_messages() {
        let remote = MemoryRemote::new();
        let mut rx = remote.subscribe();
        let id = remote.add_message(&new_message("temp_1")).await.unwrap();

        match rx.recv().await.unwrap() {
            RemoteEvent::MessageAdded(doc) => assert_eq!(doc.id, id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn typing_changes_are_deduplicated() {
        let remote = MemoryRemote::new();
        let mut rx = remote.subscribe();
        remote.set_typing("c1", "alice", true).await.unwrap();
        remote.set_typing("c1", "alice", true).await.unwrap();
        remote.set_typing("c1", "alice", false).await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            RemoteEvent::TypingChanged { typing: true, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            RemoteEvent::TypingChanged { typing: false, .. }
        ));
        assert!(remote.typing_users("c1").await.is_empty());
    }
}
