//! Local cache facade over [`messageai_store::Database`].
//!
//! Every accessor swallows store errors: failures are logged and callers get
//! an empty or default result.  A cache built with [`LocalCache::disabled`]
//! (targets without an embedded database) returns empty results
//! unconditionally and ignores writes.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use messageai_shared::protocol::LastMessage;
use messageai_shared::types::MessageStatus;
use messageai_store::{
    CachedTranslation, CachedUser, Conversation, Database, Message, StoreError,
};

use crate::config::ClientConfig;

pub struct LocalCache {
    db: Option<Mutex<Database>>,
}

impl LocalCache {
    /// Open the cache at `path`, running migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open_at(path)?;
        Ok(Self {
            db: Some(Mutex::new(db)),
        })
    }

    /// A cache with no backing database.
    pub fn disabled() -> Self {
        Self { db: None }
    }

    /// Build the cache described by `config`.  An open failure is logged and
    /// yields a disabled cache, so the app keeps working online-only.
    pub fn from_config(config: &ClientConfig) -> Self {
        if !config.local_store_enabled {
            debug!("local store disabled for this target");
            return Self::disabled();
        }

        let path = match &config.db_path {
            Some(p) => p.clone(),
            None => match Database::default_path() {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "no data directory, local cache disabled");
                    return Self::disabled();
                }
            },
        };

        match Self::open(&path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to open local cache, continuing without it");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    fn with_db<T, F>(&self, op: &'static str, default: T, f: F) -> T
    where
        F: FnOnce(&Database) -> messageai_store::Result<T>,
    {
        let Some(db) = &self.db else {
            return default;
        };
        let guard = db.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match f(&*guard) {
            Ok(value) => value,
            Err(e) => {
                warn!(op, error = %e, "local cache operation failed");
                default
            }
        }
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub fn save_message(&self, message: &Message) {
        self.with_db("save_message", (), |db| db.upsert_message(message));
    }

    pub fn get_message(&self, id: &str) -> Option<Message> {
        self.with_db("get_message", None, |db| optional(db.get_message(id)))
    }

    /// Messages of one conversation, oldest first.
    pub fn messages_for_conversation(&self, conversation_id: &str) -> Vec<Message> {
        self.with_db("messages_for_conversation", Vec::new(), |db| {
            db.get_messages_for_conversation(conversation_id)
        })
    }

    /// Messages not yet acknowledged by the remote store, oldest first.
    pub fn unsynced_messages(&self) -> Vec<Message> {
        self.with_db("unsynced_messages", Vec::new(), |db| {
            db.get_unsynced_messages()
        })
    }

    pub fn update_status(&self, id: &str, status: MessageStatus) -> bool {
        self.with_db("update_status", false, |db| {
            db.update_message_status(id, status)
        })
    }

    pub fn mark_synced(&self, id: &str) -> bool {
        self.with_db("mark_synced", false, |db| db.mark_message_synced(id))
    }

    /// Swap a placeholder id for the remote id and mark it sent + synced.
    pub fn confirm_message(&self, local_id: &str, remote_id: &str) -> bool {
        self.with_db("confirm_message", false, |db| {
            db.confirm_message(local_id, remote_id)
        })
    }

    pub fn delete_message(&self, id: &str) -> bool {
        self.with_db("delete_message", false, |db| db.delete_message(id))
    }

    // ------------------------------------------------------------------
    // Conversations
    // ------------------------------------------------------------------

    pub fn save_conversation(&self, conversation: &Conversation) {
        self.with_db("save_conversation", (), |db| {
            db.upsert_conversation(conversation)
        });
    }

    pub fn get_conversation(&self, id: &str) -> Option<Conversation> {
        self.with_db("get_conversation", None, |db| {
            optional(db.get_conversation(id))
        })
    }

    /// Cached conversations, most recent activity first.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.with_db("conversations", Vec::new(), |db| db.list_conversations())
    }

    pub fn update_last_message(&self, conversation_id: &str, last: &LastMessage) -> bool {
        self.with_db("update_last_message", false, |db| {
            db.update_conversation_last_message(conversation_id, last)
        })
    }

    pub fn set_read(&self, conversation_id: &str, uid: &str, at: DateTime<Utc>) -> bool {
        self.with_db("set_read", false, |db| {
            db.set_conversation_read(conversation_id, uid, at)
        })
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn cache_user(&self, user: &CachedUser) {
        self.with_db("cache_user", (), |db| db.upsert_cached_user(user));
    }

    pub fn cached_user(&self, uid: &str) -> Option<CachedUser> {
        self.with_db("cached_user", None, |db| optional(db.get_cached_user(uid)))
    }

    // ------------------------------------------------------------------
    // Translations
    // ------------------------------------------------------------------

    pub fn translation(&self, message_id: &str, target_language: &str) -> Option<CachedTranslation> {
        self.with_db("translation", None, |db| {
            optional(db.get_translation(message_id, target_language))
        })
    }

    pub fn save_translation(&self, translation: &CachedTranslation) {
        self.with_db("save_translation", (), |db| {
            db.upsert_translation(translation)
        });
    }

    pub fn purge_translations_before(&self, cutoff: DateTime<Utc>) -> usize {
        self.with_db("purge_translations", 0, |db| {
            db.purge_translations_before(cutoff)
        })
    }
}

fn optional<T>(result: messageai_store::Result<T>) -> messageai_store::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}
