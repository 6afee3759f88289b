//! Flushes locally queued messages to the remote store.
//!
//! A message is queued when it is written to the cache with `synced = false`
//! and no live send task owns it: it was sent while offline, or its send
//! failed.  [`SyncCoordinator::sync_pending`] walks those rows oldest first and
//! pushes each one independently.  The remote write is idempotent on the
//! local id, so a row whose remote write succeeded but whose local
//! confirmation was lost resolves to the same remote document on the next
//! pass.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use messageai_shared::types::MessageStatus;
use messageai_store::Message;

use crate::cache::LocalCache;
use crate::connectivity::Connectivity;
use crate::events::{ClientEvent, EventBus};
use crate::remote::{RemoteError, RemoteStore};

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

/// Ids of messages currently being written to the remote store.
#[derive(Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`.  Returns `None` if another task already owns it; the claim
    /// is released when the guard is dropped.
    pub fn claim(&self, id: &str) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(|p| p.into_inner());
        if !ids.insert(id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            ids: Arc::clone(&self.ids),
            id: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(id)
    }
}

pub struct InFlightGuard {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.id);
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Write `message` remotely, then confirm it in the cache and advance the
/// conversation preview on both sides.  Returns the remote id.
///
/// Only the message write itself can fail the delivery; a failed preview
/// update is logged.
pub(crate) async fn deliver(
    remote: &dyn RemoteStore,
    cache: &LocalCache,
    events: &EventBus,
    message: &Message,
) -> Result<String, RemoteError> {
    let remote_id = remote.add_message(&message.to_new_message()).await?;
    confirm_delivery(cache, events, message, &remote_id);
    publish_preview(remote, message).await;
    Ok(remote_id)
}

/// Swap the placeholder for its acknowledged copy under `remote_id` and make
/// it the cached conversation preview.
pub(crate) fn confirm_delivery(
    cache: &LocalCache,
    events: &EventBus,
    message: &Message,
    remote_id: &str,
) {
    cache.confirm_message(&message.id, remote_id);
    let confirmed = cache.get_message(remote_id).unwrap_or_else(|| Message {
        id: remote_id.to_string(),
        status: MessageStatus::Sent,
        synced: true,
        is_optimistic: false,
        ..message.clone()
    });
    events.emit(ClientEvent::MessageConfirmed {
        local_id: message.id.clone(),
        message: confirmed,
    });

    let last = message.to_new_message().last_message();
    if cache.update_last_message(&message.conversation_id, &last) {
        if let Some(conversation) = cache.get_conversation(&message.conversation_id) {
            events.emit(ClientEvent::ConversationUpdated(conversation));
        }
    }
    debug!(local_id = %message.id, remote_id, "message delivered");
}

/// Make `message` the remote conversation preview.  Failures are logged.
pub(crate) async fn publish_preview(remote: &dyn RemoteStore, message: &Message) {
    let last = message.to_new_message().last_message();
    if let Err(e) = remote
        .update_last_message(&message.conversation_id, &last)
        .await
    {
        warn!(conversation_id = %message.conversation_id, error = %e, "failed to update remote conversation preview");
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Outcome of one [`SyncCoordinator::sync_pending`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Unsynced rows a remote write was attempted for.
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    /// Unsynced rows left alone because a send task owns or already
    /// confirmed them.
    pub skipped: usize,
}

pub struct SyncCoordinator {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<LocalCache>,
    connectivity: Connectivity,
    in_flight: InFlight,
    events: EventBus,
}

impl SyncCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<LocalCache>,
        connectivity: Connectivity,
        in_flight: InFlight,
        events: EventBus,
    ) -> Self {
        Self {
            remote,
            cache,
            connectivity,
            in_flight,
            events,
        }
    }

    /// Push every unsynced cached message to the remote store, oldest first.
    /// Per-row failures are logged and counted; the pass always runs to the
    /// end.
    pub async fn sync_pending(&self) -> SyncReport {
        let pending = self.cache.unsynced_messages();
        let mut report = SyncReport::default();

        if pending.is_empty() {
            debug!("no unsynced messages");
            return report;
        }
        info!(count = pending.len(), "syncing pending messages");

        for message in pending {
            let Some(_guard) = self.in_flight.claim(&message.id) else {
                debug!(id = %message.id, "message owned by a send task, skipping");
                report.skipped += 1;
                continue;
            };
            // A send task may have confirmed the row since the snapshot.
            let message = match self.cache.get_message(&message.id) {
                Some(current) if !current.synced => current,
                _ => {
                    debug!(id = %message.id, "message confirmed since the snapshot, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            report.attempted += 1;
            match deliver(self.remote.as_ref(), &self.cache, &self.events, &message).await {
                Ok(_) => report.synced += 1,
                Err(e) => {
                    warn!(id = %message.id, error = %e, "failed to sync message");
                    report.failed += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            "sync pass finished"
        );
        self.events.emit(ClientEvent::SyncCompleted(report));
        report
    }

    /// Run a pass now if online, then one on every offline -> online
    /// transition.  The task runs until aborted.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut rx = self.connectivity.subscribe();
            let mut online = *rx.borrow_and_update();
            if online {
                self.sync_pending().await;
            }

            while rx.changed().await.is_ok() {
                let now_online = *rx.borrow_and_update();
                if now_online == online {
                    continue;
                }
                online = now_online;
                self.events
                    .emit(ClientEvent::ConnectivityChanged { online: now_online });
                if now_online {
                    self.sync_pending().await;
                }
            }
        })
    }
}
