//! Document and request shapes exchanged with remote collaborators.
//!
//! The `*Doc` structs mirror the documents held in the remote store's
//! `messages`, `conversations` and `users` collections. The request/response
//! structs are the JSON bodies of the media upload and push notify endpoints
//! and use camelCase on the wire.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MessageKind, MessageStatus};

/// Denormalized copy of the latest message, kept on the conversation for
/// list rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastMessage {
    pub text: String,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
}

/// A message as stored remotely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageDoc {
    pub id: String,
    pub conversation_id: String,
    /// Id the sending device used locally; remote writes are idempotent on it.
    pub client_id: Option<String>,
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub kind: MessageKind,
    pub media_url: Option<String>,
}

/// Body of a remote message write. The remote store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessage {
    pub client_id: String,
    pub conversation_id: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    pub media_url: Option<String>,
}

impl NewMessage {
    /// The preview stored on the parent conversation once this is written.
    pub fn last_message(&self) -> LastMessage {
        let text = match self.kind {
            MessageKind::Image if self.text.trim().is_empty() => "📷 Image".to_string(),
            _ => self.text.clone(),
        };
        LastMessage {
            text,
            sender_id: self.sender_id.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// A conversation as stored remotely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationDoc {
    pub id: String,
    pub is_group: bool,
    pub participants: Vec<String>,
    pub group_name: Option<String>,
    pub created_by: Option<String>,
    pub last_message: Option<LastMessage>,
    pub last_activity: DateTime<Utc>,
    /// user id -> last time that user read the conversation
    pub read_status: HashMap<String, DateTime<Utc>>,
}

impl ConversationDoc {
    pub fn has_participant(&self, uid: &str) -> bool {
        self.participants.iter().any(|p| p == uid)
    }

    /// The other participant of a direct conversation.
    pub fn counterpart(&self, uid: &str) -> Option<&str> {
        if self.is_group {
            return None;
        }
        self.participants
            .iter()
            .map(String::as_str)
            .find(|p| *p != uid)
    }
}

/// A user profile document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub push_token: Option<String>,
}

/// `POST /upload` request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub filename: String,
    pub content_type: String,
    pub folder: String,
}

/// `POST /upload` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Time-limited URL accepting a single `PUT` of the object bytes.
    pub upload_url: String,
    /// Object key; the public URL is derived from it.
    pub key: String,
}

/// `POST /notify` request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub push_tokens: Vec<String>,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// `POST /notify` response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub sent: usize,
    pub failed: usize,
}
