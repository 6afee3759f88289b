//! Direct and group conversations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use messageai_shared::constants::MIN_GROUP_PARTICIPANTS;
use messageai_shared::protocol::ConversationDoc;
use messageai_shared::types::direct_conversation_id;
use messageai_store::Conversation;

use crate::cache::LocalCache;
use crate::error::ServiceError;
use crate::events::{ClientEvent, EventBus};
use crate::remote::{RemoteError, RemoteStore};
use crate::services::users::UserDirectory;

/// One row of the conversation list.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    /// Group name, or the other participant's display name.
    pub title: String,
    pub photo_url: Option<String>,
    pub unread: bool,
}

pub struct ConversationService {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<LocalCache>,
    users: Arc<UserDirectory>,
    events: EventBus,
}

impl ConversationService {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<LocalCache>,
        users: Arc<UserDirectory>,
        events: EventBus,
    ) -> Self {
        Self {
            remote,
            cache,
            users,
            events,
        }
    }

    /// The direct conversation between `a` and `b`, created if missing.
    /// Its id depends only on the two user ids, so repeated calls from either
    /// side land on the same conversation.
    pub async fn get_or_create_direct(&self, a: &str, b: &str) -> Result<Conversation, ServiceError> {
        if a.is_empty() || b.is_empty() {
            return Err(ServiceError::Invalid("user id is empty".into()));
        }
        if a == b {
            return Err(ServiceError::Invalid(
                "cannot start a conversation with yourself".into(),
            ));
        }

        let existing = match self.remote.find_direct_conversation(a, b).await {
            Ok(found) => found,
            Err(e) => return self.cached_or(&direct_conversation_id(a, b), e),
        };

        let doc = match existing {
            Some(doc) => doc,
            None => {
                let doc = ConversationDoc {
                    id: direct_conversation_id(a, b),
                    is_group: false,
                    participants: vec![a.to_string(), b.to_string()],
                    group_name: None,
                    created_by: Some(a.to_string()),
                    last_message: None,
                    last_activity: Utc::now(),
                    read_status: HashMap::new(),
                };
                let stored = self.remote.create_conversation(&doc).await?;
                info!(id = %stored.id, "direct conversation created");
                stored
            }
        };

        Ok(self.store(doc))
    }

    /// Create a named group.  `members` may include the creator; duplicates
    /// are dropped before the size check.
    pub async fn create_group(
        &self,
        creator: &str,
        members: &[String],
        name: &str,
    ) -> Result<Conversation, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Invalid("group name is required".into()));
        }

        let mut seen = HashSet::new();
        let participants: Vec<String> = std::iter::once(creator.to_string())
            .chain(members.iter().cloned())
            .filter(|uid| !uid.is_empty() && seen.insert(uid.clone()))
            .collect();
        if participants.len() < MIN_GROUP_PARTICIPANTS {
            return Err(ServiceError::Invalid(format!(
                "a group needs at least {MIN_GROUP_PARTICIPANTS} participants, got {}",
                participants.len()
            )));
        }

        let doc = ConversationDoc {
            id: Uuid::new_v4().to_string(),
            is_group: true,
            participants,
            group_name: Some(name.to_string()),
            created_by: Some(creator.to_string()),
            last_message: None,
            last_activity: Utc::now(),
            read_status: HashMap::new(),
        };
        let stored = self.remote.create_conversation(&doc).await?;
        info!(id = %stored.id, members = stored.participants.len(), "group created");

        Ok(self.store(stored))
    }

    /// Conversation list for `uid`, most recent activity first, with titles
    /// resolved.  Falls back to the cached list when the remote read fails.
    pub async fn list_for_user(&self, uid: &str) -> Vec<ConversationSummary> {
        let mut conversations: Vec<Conversation> =
            match self.remote.conversations_for_user(uid).await {
                Ok(docs) => docs
                    .into_iter()
                    .map(|doc| {
                        let conversation = Conversation::from(doc);
                        self.cache.save_conversation(&conversation);
                        conversation
                    })
                    .collect(),
                Err(e) => {
                    warn!(uid, error = %e, "remote read failed, using cached conversations");
                    self.cache
                        .conversations()
                        .into_iter()
                        .filter(|c| c.participants.iter().any(|p| p == uid))
                        .collect()
                }
            };
        conversations.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        // One lookup per distinct counterpart, all at once.
        let counterparts: HashSet<&str> = conversations
            .iter()
            .filter(|c| !c.is_group)
            .filter_map(|c| counterpart(c, uid))
            .collect();
        let lookups = counterparts.into_iter().map(|other| async move {
            (other.to_string(), self.users.get_user(other).await)
        });
        let profiles: HashMap<String, _> = join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(other, user)| user.map(|u| (other, u)))
            .collect();
        debug!(uid, count = conversations.len(), profiles = profiles.len(), "conversation list resolved");

        conversations
            .into_iter()
            .map(|conversation| {
                let (title, photo_url) = if conversation.is_group {
                    (
                        conversation
                            .group_name
                            .clone()
                            .unwrap_or_else(|| "Group".to_string()),
                        None,
                    )
                } else {
                    match counterpart(&conversation, uid) {
                        Some(other) => match profiles.get(other) {
                            Some(user) => (user.display_name.clone(), user.photo_url.clone()),
                            None => (other.to_string(), None),
                        },
                        None => ("Unknown".to_string(), None),
                    }
                };
                let unread = conversation.has_unread(uid);
                ConversationSummary {
                    conversation,
                    title,
                    photo_url,
                    unread,
                }
            })
            .collect()
    }

    /// Cached conversation, refreshed from the remote store when reachable.
    pub async fn get(&self, id: &str) -> Option<Conversation> {
        match self.remote.get_conversation(id).await {
            Ok(Some(doc)) => Some(self.store(doc)),
            Ok(None) => None,
            Err(e) => {
                debug!(id, error = %e, "remote read failed, using cached conversation");
                self.cache.get_conversation(id)
            }
        }
    }

    /// Publish the typing indicator.  Failures are logged and ignored.
    pub async fn set_typing(&self, conversation_id: &str, uid: &str, typing: bool) {
        if let Err(e) = self.remote.set_typing(conversation_id, uid, typing).await {
            debug!(conversation_id, uid, error = %e, "failed to publish typing state");
        }
    }

    fn store(&self, doc: ConversationDoc) -> Conversation {
        let conversation = Conversation::from(doc);
        self.cache.save_conversation(&conversation);
        self.events
            .emit(ClientEvent::ConversationUpdated(conversation.clone()));
        conversation
    }

    fn cached_or(&self, id: &str, error: RemoteError) -> Result<Conversation, ServiceError> {
        match self.cache.get_conversation(id) {
            Some(conversation) => {
                warn!(id, error = %error, "remote unavailable, using cached conversation");
                Ok(conversation)
            }
            None => Err(error.into()),
        }
    }
}

fn counterpart<'a>(conversation: &'a Conversation, uid: &str) -> Option<&'a str> {
    conversation
        .participants
        .iter()
        .map(String::as_str)
        .find(|p| *p != uid)
}
