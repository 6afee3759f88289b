#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::sync::{broadcast, watch};

use messageai_client::cache::LocalCache;
use messageai_client::config::ClientConfig;
use messageai_client::remote::{MemoryRemote, RemoteError, RemoteEvent, RemoteStore};
use messageai_client::services::messaging::Author;
use messageai_client::state::AppState;
use messageai_shared::protocol::{
    ConversationDoc, LastMessage, MessageDoc, NewMessage, UserProfile,
};
use messageai_shared::types::MessageStatus;

pub struct Harness {
    pub state: AppState,
    pub remote: Arc<MemoryRemote>,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let remote = Arc::new(MemoryRemote::new());
        Self::with_remote(remote.clone(), remote, Duration::from_secs(5))
    }

    /// `store` is what the services talk to; `remote` is the backing memory
    /// store used for assertions.
    pub fn with_remote(
        store: Arc<dyn RemoteStore>,
        remote: Arc<MemoryRemote>,
        send_timeout: Duration,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            db_path: Some(dir.path().join("cache.db")),
            media_cache_dir: Some(dir.path().join("media")),
            send_timeout,
            ..ClientConfig::default()
        };
        let cache = Arc::new(LocalCache::open(&dir.path().join("cache.db")).unwrap());
        let state = AppState::with_cache(config, store, cache);
        Self {
            state,
            remote,
            _dir: dir,
        }
    }
}

pub fn alice() -> Author {
    Author::new("alice", "Alice")
}

pub fn profile(uid: &str, name: &str) -> UserProfile {
    UserProfile {
        uid: uid.into(),
        display_name: name.into(),
        email: format!("{uid}@example.com"),
        photo_url: None,
        is_online: false,
        last_seen: None,
        push_token: Some(format!("ExponentPushToken[{uid}]")),
    }
}

/// Remote store whose message writes block until the gate is opened.
/// Conversation preview updates can be held back as well.
pub struct GatedRemote {
    inner: Arc<MemoryRemote>,
    writes: watch::Sender<bool>,
    previews: watch::Sender<bool>,
}

impl GatedRemote {
    pub fn new(inner: Arc<MemoryRemote>) -> Self {
        Self {
            inner,
            writes: watch::channel(false).0,
            previews: watch::channel(true).0,
        }
    }

    /// Message writes go through; preview updates hang until [`open`].
    ///
    /// [`open`]: GatedRemote::open
    pub fn stalling_previews(inner: Arc<MemoryRemote>) -> Self {
        Self {
            inner,
            writes: watch::channel(true).0,
            previews: watch::channel(false).0,
        }
    }

    pub fn open(&self) {
        self.writes.send_replace(true);
        self.previews.send_replace(true);
    }
}

async fn pass(gate: &watch::Sender<bool>) -> Result<(), RemoteError> {
    let mut rx = gate.subscribe();
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return Err(RemoteError::Unavailable("gate dropped".into()));
        }
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for GatedRemote {
    async fn add_message(&self, message: &NewMessage) -> Result<String, RemoteError> {
        pass(&self.writes).await?;
        self.inner.add_message(message).await
    }

    async fn update_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), RemoteError> {
        self.inner.update_message_status(message_id, status).await
    }

    async fn messages_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<MessageDoc>, RemoteError> {
        self.inner.messages_for_conversation(conversation_id).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<ConversationDoc>, RemoteError> {
        self.inner.get_conversation(id).await
    }

    async fn find_direct_conversation(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<ConversationDoc>, RemoteError> {
        self.inner.find_direct_conversation(a, b).await
    }

    async fn create_conversation(
        &self,
        doc: &ConversationDoc,
    ) -> Result<ConversationDoc, RemoteError> {
        self.inner.create_conversation(doc).await
    }

    async fn update_last_message(
        &self,
        conversation_id: &str,
        last: &LastMessage,
    ) -> Result<(), RemoteError> {
        pass(&self.previews).await?;
        self.inner.update_last_message(conversation_id, last).await
    }

    async fn conversations_for_user(&self, uid: &str) -> Result<Vec<ConversationDoc>, RemoteError> {
        self.inner.conversations_for_user(uid).await
    }

    async fn mark_read(
        &self,
        conversation_id: &str,
        uid: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RemoteError> {
        self.inner.mark_read(conversation_id, uid, at).await
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, RemoteError> {
        self.inner.get_user(uid).await
    }

    async fn set_typing(
        &self,
        conversation_id: &str,
        uid: &str,
        typing: bool,
    ) -> Result<(), RemoteError> {
        self.inner.set_typing(conversation_id, uid, typing).await
    }

    fn subscribe(&self) -> broadcast::Receiver<RemoteEvent> {
        self.inner.subscribe()
    }
}

/// Wait until the remote preview of `conversation_id` shows `text`.
pub async fn remote_preview(remote: &MemoryRemote, conversation_id: &str, text: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let doc = remote.get_conversation(conversation_id).await.unwrap();
            if doc
                .and_then(|c| c.last_message)
                .is_some_and(|last| last.text == text)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("remote conversation preview was not updated");
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: axum::Router) -> String {
    serve_with(|_| router).await
}

/// Like [`serve`], for routers that need to know their own base URL.
pub async fn serve_with<F>(build: F) -> String
where
    F: FnOnce(String) -> axum::Router,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let router = build(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    base
}
