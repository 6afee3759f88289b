mod common;

use std::sync::Arc;
use std::time::Duration;

use messageai_client::events::ClientEvent;
use messageai_client::remote::{MemoryRemote, RemoteStore};
use messageai_client::services::messaging::SendOutcome;
use messageai_client::sync::SyncReport;
use messageai_shared::types::MessageStatus;

use common::{alice, GatedRemote, Harness};

#[tokio::test]
async fn offline_sends_reach_the_remote_exactly_once() {
    let h = Harness::new();
    let conversation = h
        .state
        .conversations
        .get_or_create_direct("alice", "bob")
        .await
        .unwrap();

    h.state.connectivity.set_online(false);
    for text in ["one", "two", "three"] {
        tokio::time::sleep(Duration::from_millis(3)).await;
        let pending = h.state.messages.send_text(&conversation.id, &alice(), text).unwrap();
        assert_eq!(pending.outcome.await.unwrap(), SendOutcome::Queued);
    }
    assert_eq!(h.state.cache.unsynced_messages().len(), 3);

    h.state.connectivity.set_online(true);
    let report = h.state.sync.sync_pending().await;
    assert_eq!(
        report,
        SyncReport {
            attempted: 3,
            synced: 3,
            failed: 0,
            skipped: 0
        }
    );
    assert_eq!(h.remote.message_count().await, 3);

    // Nothing left: a second pass acts on an empty set.
    let again = h.state.sync.sync_pending().await;
    assert_eq!(again, SyncReport::default());
    assert_eq!(h.remote.message_count().await, 3);

    let cached = h.state.cache.messages_for_conversation(&conversation.id);
    assert_eq!(cached.len(), 3);
    assert!(cached.iter().all(|m| m.synced && m.status == MessageStatus::Sent));
    let local = h.state.cache.get_conversation(&conversation.id).unwrap();
    assert_eq!(local.last_message.unwrap().text, "three");
}

#[tokio::test]
async fn failures_are_counted_and_left_for_the_next_pass() {
    let h = Harness::new();
    h.state.connectivity.set_online(false);
    h.state.messages.send_text("c1", &alice(), "a").unwrap();
    h.state.messages.send_text("c1", &alice(), "b").unwrap();

    h.remote.set_reachable(false);
    let report = h.state.sync.sync_pending().await;
    assert_eq!(report.attempted, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(h.state.cache.unsynced_messages().len(), 2);

    h.remote.set_reachable(true);
    let report = h.state.sync.sync_pending().await;
    assert_eq!(report.synced, 2);
    assert!(h.state.cache.unsynced_messages().is_empty());
}

#[tokio::test]
async fn resend_after_lost_confirmation_does_not_duplicate() {
    let h = Harness::new();
    h.state.connectivity.set_online(false);
    let pending = h.state.messages.send_text("c1", &alice(), "once").unwrap();

    // The remote write lands but the device never records the ack.
    let remote_id = h
        .remote
        .add_message(&pending.message.to_new_message())
        .await
        .unwrap();
    assert_eq!(h.state.cache.unsynced_messages().len(), 1);

    let report = h.state.sync.sync_pending().await;
    assert_eq!(report.synced, 1);
    assert_eq!(h.remote.message_count().await, 1);
    assert!(h.state.cache.get_message(&remote_id).unwrap().synced);
}

#[tokio::test]
async fn messages_owned_by_a_send_task_are_skipped() {
    let memory = Arc::new(MemoryRemote::new());
    let gated = Arc::new(GatedRemote::new(memory.clone()));
    let h = Harness::with_remote(gated.clone(), memory.clone(), Duration::from_secs(5));

    let pending = h.state.messages.send_text("c1", &alice(), "racing").unwrap();
    let report = h.state.sync.sync_pending().await;
    assert_eq!(report.skipped, 1);
    assert_eq!(report.attempted, 0);

    gated.open();
    assert!(matches!(pending.outcome.await.unwrap(), SendOutcome::Sent { .. }));
    assert_eq!(memory.message_count().await, 1);
}

#[tokio::test]
async fn reconnect_triggers_a_sync_pass() {
    let h = Harness::new();
    h.state.connectivity.set_online(false);
    let mut events = h.state.events.subscribe();
    let tasks = h.state.start();

    h.state.messages.send_text("c1", &alice(), "queued").unwrap();
    h.state.connectivity.set_online(true);

    let report = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(ClientEvent::SyncCompleted(report)) = events.recv().await {
                return report;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(h.remote.message_count().await, 1);
    for task in tasks {
        task.abort();
    }
}

#[tokio::test]
async fn rows_confirmed_during_a_pass_are_not_resent() {
    let memory = Arc::new(MemoryRemote::new());
    let gated = Arc::new(GatedRemote::new(memory.clone()));
    let h = Harness::with_remote(gated.clone(), memory.clone(), Duration::from_secs(5));

    h.state.connectivity.set_online(false);
    let first = h.state.messages.send_text("c1", &alice(), "first").unwrap();
    tokio::time::sleep(Duration::from_millis(3)).await;
    let second = h.state.messages.send_text("c1", &alice(), "second").unwrap();
    assert_eq!(h.state.cache.unsynced_messages().len(), 2);

    // The pass blocks on the first row's write.
    let sync = Arc::clone(&h.state.sync);
    let pass = tokio::spawn(async move { sync.sync_pending().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Meanwhile another writer confirms the second row.
    assert!(h.state.cache.confirm_message(&second.message.id, "remote-second"));
    gated.open();

    let report = pass.await.unwrap();
    assert_eq!(
        report,
        SyncReport {
            attempted: 1,
            synced: 1,
            failed: 0,
            skipped: 1
        }
    );
    assert_eq!(memory.message_count().await, 1);
    assert!(h.state.cache.get_message(&first.message.id).is_none());
    assert!(h.state.cache.get_message("remote-second").unwrap().synced);
}
