//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the UI layer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use messageai_shared::protocol::{ConversationDoc, LastMessage, MessageDoc, NewMessage, UserProfile};
use messageai_shared::types::{MessageKind, MessageStatus};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat message as cached on the device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// `temp_<uuid>` while optimistic, the remote id once confirmed.
    pub id: String,
    pub conversation_id: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub kind: MessageKind,
    /// Public URL of the attached media for image messages.
    pub media_url: Option<String>,
    /// Whether the remote store holds this message.
    pub synced: bool,
    /// Whether this row is a locally constructed placeholder.
    pub is_optimistic: bool,
}

impl Message {
    /// Body of the remote write for this message.  The local id travels as
    /// `client_id` so a resend resolves to the same remote document.
    pub fn to_new_message(&self) -> NewMessage {
        NewMessage {
            client_id: self.id.clone(),
            conversation_id: self.conversation_id.clone(),
            text: self.text.clone(),
            sender_id: self.sender_id.clone(),
            sender_name: self.sender_name.clone(),
            timestamp: self.timestamp,
            kind: self.kind,
            media_url: self.media_url.clone(),
        }
    }
}

impl From<MessageDoc> for Message {
    fn from(doc: MessageDoc) -> Self {
        Self {
            id: doc.id,
            conversation_id: doc.conversation_id,
            text: doc.text,
            sender_id: doc.sender_id,
            sender_name: doc.sender_name,
            timestamp: doc.timestamp,
            status: doc.status,
            kind: doc.kind,
            media_url: doc.media_url,
            synced: true,
            is_optimistic: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A direct or group conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub is_group: bool,
    /// Unique participant ids; order carries no meaning.
    pub participants: Vec<String>,
    pub group_name: Option<String>,
    pub last_message: Option<LastMessage>,
    pub last_activity: DateTime<Utc>,
    /// user id -> last time that user read the conversation
    pub read_status: HashMap<String, DateTime<Utc>>,
}

impl Conversation {
    /// Drop duplicate participants and read markers of non-participants.
    pub fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.participants.retain(|p| seen.insert(p.clone()));
        let participants = &self.participants;
        self.read_status
            .retain(|uid, _| participants.iter().any(|p| p == uid));
    }

    /// Whether someone else's message arrived after the user's read marker.
    pub fn has_unread(&self, uid: &str) -> bool {
        let Some(last) = &self.last_message else {
            return false;
        };
        if last.sender_id == uid {
            return false;
        }
        match self.read_status.get(uid) {
            Some(read_at) => *read_at < last.timestamp,
            None => true,
        }
    }
}

impl From<ConversationDoc> for Conversation {
    fn from(doc: ConversationDoc) -> Self {
        let mut conversation = Self {
            id: doc.id,
            is_group: doc.is_group,
            participants: doc.participants,
            group_name: doc.group_name,
            last_message: doc.last_message,
            last_activity: doc.last_activity,
            read_status: doc.read_status,
        };
        conversation.normalize();
        conversation
    }
}

// ---------------------------------------------------------------------------
// Cached user
// ---------------------------------------------------------------------------

/// Local copy of a remote user profile.  Never expires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedUser {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub cached_at: DateTime<Utc>,
}

impl CachedUser {
    pub fn from_profile(profile: UserProfile, cached_at: DateTime<Utc>) -> Self {
        Self {
            uid: profile.uid,
            display_name: profile.display_name,
            email: profile.email,
            photo_url: profile.photo_url,
            is_online: profile.is_online,
            last_seen: profile.last_seen,
            cached_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Cached translation
// ---------------------------------------------------------------------------

/// Memoized translation of one message into one target language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedTranslation {
    /// `<message_id>_<target_language>`
    pub id: String,
    pub message_id: String,
    pub source_text: String,
    pub translated_text: String,
    pub detected_language: Option<String>,
    pub target_language: String,
    pub created_at: DateTime<Utc>,
}

impl CachedTranslation {
    pub fn cache_key(message_id: &str, target_language: &str) -> String {
        format!("{message_id}_{target_language}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Conversation {
        Conversation {
            id: "c1".into(),
            is_group: true,
            participants: vec!["a".into(), "b".into(), "a".into(), "c".into()],
            group_name: Some("Trip".into()),
            last_message: None,
            last_activity: Utc::now(),
            read_status: HashMap::new(),
        }
    }

    #[test]
    fn normalize_dedups_and_drops_strangers() {
        let mut conv = conversation();
        conv.read_status.insert("a".into(), Utc::now());
        conv.read_status.insert("mallory".into(), Utc::now());
        conv.normalize();

        assert_eq!(conv.participants, vec!["a", "b", "c"]);
        assert!(conv.read_status.contains_key("a"));
        assert!(!conv.read_status.contains_key("mallory"));
    }

    #[test]
    fn unread_compares_marker_with_last_message() {
        let mut conv = conversation();
        let sent_at = Utc::now();
        conv.last_message = Some(LastMessage {
            text: "hi".into(),
            sender_id: "b".into(),
            timestamp: sent_at,
        });
        assert!(conv.has_unread("a"));
        assert!(!conv.has_unread("b"));

        conv.read_status
            .insert("a".into(), sent_at + chrono::Duration::seconds(1));
        assert!(!conv.has_unread("a"));
    }
}
