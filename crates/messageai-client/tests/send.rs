mod common;

use std::sync::Arc;
use std::time::Duration;

use messageai_client::error::SendError;
use messageai_client::events::ClientEvent;
use messageai_client::remote::{MemoryRemote, RemoteStore};
use messageai_client::services::messaging::SendOutcome;
use messageai_shared::types::{is_temp_id, MessageStatus};

use common::{alice, remote_preview, GatedRemote, Harness};

#[tokio::test]
async fn placeholder_is_visible_before_the_remote_write() {
    let memory = Arc::new(MemoryRemote::new());
    let gated = Arc::new(GatedRemote::new(memory.clone()));
    let h = Harness::with_remote(gated.clone(), memory.clone(), Duration::from_secs(5));
    let conversation = h
        .state
        .conversations
        .get_or_create_direct("alice", "bob")
        .await
        .unwrap();

    let pending = h
        .state
        .messages
        .send_text(&conversation.id, &alice(), "  hello bob  ")
        .unwrap();

    // Nothing has reached the remote store yet, but the placeholder is cached.
    assert!(is_temp_id(&pending.message.id));
    assert_eq!(pending.message.text, "hello bob");
    let cached = h.state.cache.get_message(&pending.message.id).unwrap();
    assert_eq!(cached.status, MessageStatus::Sending);
    assert!(cached.is_optimistic);
    assert_eq!(memory.message_count().await, 0);

    gated.open();
    let outcome = tokio::time::timeout(Duration::from_secs(5), pending.outcome)
        .await
        .unwrap()
        .unwrap();
    let SendOutcome::Sent { remote_id } = outcome else {
        panic!("expected sent, got {outcome:?}");
    };

    assert!(h.state.cache.get_message(&pending.message.id).is_none());
    let confirmed = h.state.cache.get_message(&remote_id).unwrap();
    assert_eq!(confirmed.status, MessageStatus::Sent);
    assert!(confirmed.synced);
    assert!(!confirmed.is_optimistic);

    // sending -> sent advanced the conversation on both sides.
    let local = h.state.cache.get_conversation(&conversation.id).unwrap();
    assert_eq!(local.last_message.as_ref().unwrap().text, "hello bob");
    assert_eq!(local.last_activity, confirmed.timestamp);
    remote_preview(&memory, &conversation.id, "hello bob").await;
}

#[tokio::test]
async fn failed_message_can_be_retried_until_sent() {
    let h = Harness::new();
    h.remote.set_reachable(false);

    let pending = h.state.messages.send_text("c1", &alice(), "hi").unwrap();
    let outcome = pending.outcome.await.unwrap();
    assert!(matches!(outcome, SendOutcome::Failed { .. }));

    let failed = h.state.cache.get_message(&pending.message.id).unwrap();
    assert_eq!(failed.status, MessageStatus::Failed);
    assert!(!failed.synced);

    h.remote.set_reachable(true);
    let retried = h.state.messages.retry(&pending.message.id).unwrap();
    assert_eq!(retried.message.id, pending.message.id);
    assert_eq!(
        h.state.cache.get_message(&pending.message.id).unwrap().status,
        MessageStatus::Sending
    );

    let SendOutcome::Sent { remote_id } = retried.outcome.await.unwrap() else {
        panic!("retry did not succeed");
    };
    let visible = h.state.messages.load_messages("c1").await;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, remote_id);
    assert_eq!(visible[0].status, MessageStatus::Sent);
}

#[tokio::test]
async fn hung_remote_write_times_out_into_failed() {
    let memory = Arc::new(MemoryRemote::new());
    let gated = Arc::new(GatedRemote::new(memory.clone()));
    let h = Harness::with_remote(gated, memory, Duration::from_millis(100));

    let pending = h.state.messages.send_text("c1", &alice(), "anyone?").unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), pending.outcome)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(outcome, SendOutcome::Failed { error } if error.contains("timed out")));
    assert_eq!(
        h.state.cache.get_message(&pending.message.id).unwrap().status,
        MessageStatus::Failed
    );
}

#[tokio::test]
async fn stalled_preview_update_does_not_fail_a_delivered_message() {
    let memory = Arc::new(MemoryRemote::new());
    let gated = Arc::new(GatedRemote::stalling_previews(memory.clone()));
    let h = Harness::with_remote(gated.clone(), memory.clone(), Duration::from_millis(200));
    let mut events = h.state.events.subscribe();

    let pending = h.state.messages.send_text("c1", &alice(), "made it").unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), pending.outcome)
        .await
        .unwrap()
        .unwrap();
    let SendOutcome::Sent { remote_id } = outcome else {
        panic!("expected sent, got {outcome:?}");
    };

    // Outlive the send timeout while the preview update is still hanging.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(memory.message_count().await, 1);
    let confirmed = h.state.cache.get_message(&remote_id).unwrap();
    assert_eq!(confirmed.status, MessageStatus::Sent);
    assert!(confirmed.synced);
    assert!(h.state.cache.get_message(&pending.message.id).is_none());
    assert!(matches!(
        h.state.messages.retry(&remote_id),
        Err(SendError::NotRetryable(MessageStatus::Sent))
    ));

    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(event, ClientEvent::MessageFailed { .. }),
            "delivered message reported as failed"
        );
    }

    gated.open();
    remote_preview(&memory, "c1", "made it").await;
}

#[tokio::test]
async fn timeout_error_names_sub_second_durations() {
    let memory = Arc::new(MemoryRemote::new());
    let gated = Arc::new(GatedRemote::new(memory.clone()));
    let h = Harness::with_remote(gated, memory, Duration::from_millis(150));

    let pending = h.state.messages.send_text("c1", &alice(), "tick").unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), pending.outcome)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        outcome,
        SendOutcome::Failed {
            error: "send timed out after 150ms".to_string()
        }
    );
}

#[tokio::test]
async fn offline_send_is_queued() {
    let h = Harness::new();
    h.state.connectivity.set_online(false);

    let pending = h.state.messages.send_text("c1", &alice(), "later").unwrap();
    assert_eq!(pending.outcome.await.unwrap(), SendOutcome::Queued);
    assert_eq!(h.state.cache.unsynced_messages().len(), 1);
    assert_eq!(h.remote.message_count().await, 0);
}

#[tokio::test]
async fn invalid_sends_and_retries_are_rejected() {
    let h = Harness::new();

    assert!(matches!(
        h.state.messages.send_text("c1", &alice(), "   "),
        Err(SendError::EmptyMessage)
    ));
    assert!(matches!(
        h.state.messages.retry("temp_missing"),
        Err(SendError::NotFound(_))
    ));

    h.state.connectivity.set_online(false);
    let queued = h.state.messages.send_text("c1", &alice(), "hi").unwrap();
    assert!(matches!(
        h.state.messages.retry(&queued.message.id),
        Err(SendError::NotRetryable(MessageStatus::Sending))
    ));
}

#[tokio::test]
async fn load_merges_remote_and_pending_messages() {
    let h = Harness::new();

    let sent = h.state.messages.send_text("c1", &alice(), "first").unwrap();
    assert!(matches!(sent.outcome.await.unwrap(), SendOutcome::Sent { .. }));
    tokio::time::sleep(Duration::from_millis(5)).await;

    h.state.connectivity.set_online(false);
    let queued = h.state.messages.send_text("c1", &alice(), "second").unwrap();

    let messages = h.state.messages.load_messages("c1").await;
    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(messages[1].id, queued.message.id);
    assert!(!messages[1].synced);

    // Remote unreachable: the cached view is served.
    h.remote.set_reachable(false);
    assert_eq!(h.state.messages.load_messages("c1").await.len(), 2);
}

#[tokio::test]
async fn mark_read_updates_both_sides() {
    let h = Harness::new();
    let conversation = h
        .state
        .conversations
        .get_or_create_direct("alice", "bob")
        .await
        .unwrap();

    h.state
        .messages
        .mark_read(&conversation.id, "bob")
        .await
        .unwrap();

    let local = h.state.cache.get_conversation(&conversation.id).unwrap();
    assert!(local.read_status.contains_key("bob"));
    let remote = h.remote.get_conversation(&conversation.id).await.unwrap().unwrap();
    assert!(remote.read_status.contains_key("bob"));

    assert!(h
        .state
        .messages
        .mark_read(&conversation.id, "mallory")
        .await
        .is_err());
}
