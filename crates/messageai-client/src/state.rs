//! Application context shared by the UI layer.
//!
//! [`AppState`] owns one handle to every service.  Services share the local
//! cache, the remote store, the connectivity flag, the event bus and the
//! in-flight set, so a message sent through [`AppState::messages`] is never
//! picked up twice by [`AppState::sync`].

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::LocalCache;
use crate::config::ClientConfig;
use crate::connectivity::Connectivity;
use crate::events::EventBus;
use crate::mirror::RemoteMirror;
use crate::remote::RemoteStore;
use crate::services::ai::AiClient;
use crate::services::conversations::ConversationService;
use crate::services::media::{MediaCache, MediaUploader};
use crate::services::messaging::MessageService;
use crate::services::push::{PushClient, PushNotifier};
use crate::services::translation::TranslationService;
use crate::services::users::UserDirectory;
use crate::sync::{InFlight, SyncCoordinator};

pub struct AppState {
    pub config: ClientConfig,
    pub cache: Arc<LocalCache>,
    pub remote: Arc<dyn RemoteStore>,
    pub connectivity: Connectivity,
    pub events: EventBus,

    pub messages: Arc<MessageService>,
    pub conversations: Arc<ConversationService>,
    pub users: Arc<UserDirectory>,
    pub sync: Arc<SyncCoordinator>,

    pub uploader: Arc<MediaUploader>,
    /// `None` when no cache directory could be created.
    pub media_cache: Option<Arc<MediaCache>>,
    pub push: Arc<PushClient>,
    pub ai: Arc<AiClient>,
    pub translations: Arc<TranslationService>,
}

impl AppState {
    /// Wire every service from `config` around `remote`.
    pub fn new(config: ClientConfig, remote: Arc<dyn RemoteStore>) -> Self {
        let cache = Arc::new(LocalCache::from_config(&config));
        Self::with_cache(config, remote, cache)
    }

    pub fn with_cache(
        config: ClientConfig,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<LocalCache>,
    ) -> Self {
        let connectivity = Connectivity::default();
        let events = EventBus::new();
        let in_flight = InFlight::new();

        let uploader = Arc::new(MediaUploader::from_config(&config));
        let media_cache = match MediaCache::from_config(&config) {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                warn!(error = %e, "media cache unavailable");
                None
            }
        };

        let users = Arc::new(UserDirectory::new(Arc::clone(&remote), Arc::clone(&cache)));
        let messages = Arc::new(
            MessageService::new(
                Arc::clone(&remote),
                Arc::clone(&cache),
                connectivity.clone(),
                in_flight.clone(),
                events.clone(),
                config.send_timeout,
            )
            .with_uploader(Arc::clone(&uploader)),
        );
        let conversations = Arc::new(ConversationService::new(
            Arc::clone(&remote),
            Arc::clone(&cache),
            Arc::clone(&users),
            events.clone(),
        ));
        let sync = Arc::new(SyncCoordinator::new(
            Arc::clone(&remote),
            Arc::clone(&cache),
            connectivity.clone(),
            in_flight,
            events.clone(),
        ));

        let push = Arc::new(PushClient::new(&config.push_endpoint));
        let ai = Arc::new(AiClient::from_config(&config));
        let translations = Arc::new(TranslationService::new(Arc::clone(&ai), Arc::clone(&cache)));

        Self {
            config,
            cache,
            remote,
            connectivity,
            events,
            messages,
            conversations,
            users,
            sync,
            uploader,
            media_cache,
            push,
            ai,
            translations,
        }
    }

    /// Start the background tasks: the sync coordinator, the remote mirror
    /// and, when a probe URL is configured, the connectivity probe.  Expired
    /// translations are swept once.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![
            Arc::clone(&self.sync).spawn(),
            RemoteMirror::new(
                Arc::clone(&self.remote),
                Arc::clone(&self.cache),
                self.events.clone(),
            )
            .spawn(),
        ];

        if let Some(url) = &self.config.probe_url {
            tasks.push(
                self.connectivity
                    .spawn_probe(url.clone(), self.config.probe_interval),
            );
        }

        self.translations.sweep_expired();
        info!(
            local_store = self.cache.is_enabled(),
            ai = self.ai.is_configured(),
            "client started"
        );
        tasks
    }

    /// Notifier sending a push for every new remote message.  Only one
    /// process per deployment should run it.
    pub fn push_notifier(&self) -> PushNotifier {
        PushNotifier::new(Arc::clone(&self.remote), Arc::clone(&self.push))
    }
}
