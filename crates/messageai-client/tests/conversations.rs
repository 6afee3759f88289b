mod common;

use messageai_client::error::ServiceError;
use messageai_client::remote::RemoteStore;
use messageai_client::services::messaging::SendOutcome;

use common::{alice, profile, remote_preview, Harness};

#[tokio::test]
async fn direct_conversation_is_created_once() {
    let h = Harness::new();
    let first = h
        .state
        .conversations
        .get_or_create_direct("alice", "bob")
        .await
        .unwrap();
    let second = h
        .state
        .conversations
        .get_or_create_direct("bob", "alice")
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.id, "alice_bob");
    assert_eq!(h.remote.conversations_for_user("alice").await.unwrap().len(), 1);

    assert!(matches!(
        h.state.conversations.get_or_create_direct("alice", "alice").await,
        Err(ServiceError::Invalid(_))
    ));
}

#[tokio::test]
async fn direct_conversation_falls_back_to_cache_when_offline() {
    let h = Harness::new();
    let created = h
        .state
        .conversations
        .get_or_create_direct("alice", "bob")
        .await
        .unwrap();

    h.remote.set_reachable(false);
    let cached = h
        .state
        .conversations
        .get_or_create_direct("alice", "bob")
        .await
        .unwrap();
    assert_eq!(cached.id, created.id);

    assert!(matches!(
        h.state.conversations.get_or_create_direct("alice", "carol").await,
        Err(ServiceError::Remote(_))
    ));
}

#[tokio::test]
async fn groups_need_a_name_and_three_distinct_members() {
    let h = Harness::new();
    let members = vec!["bob".to_string(), "bob".to_string(), "alice".to_string()];

    assert!(matches!(
        h.state.conversations.create_group("alice", &members, "Trip").await,
        Err(ServiceError::Invalid(_))
    ));

    let members = vec!["bob".to_string(), "carol".to_string()];
    assert!(matches!(
        h.state.conversations.create_group("alice", &members, "  ").await,
        Err(ServiceError::Invalid(_))
    ));

    let group = h
        .state
        .conversations
        .create_group("alice", &members, "Trip")
        .await
        .unwrap();
    assert!(group.is_group);
    assert_eq!(group.participants, vec!["alice", "bob", "carol"]);
    assert_eq!(group.group_name.as_deref(), Some("Trip"));
}

#[tokio::test]
async fn list_is_ordered_by_activity_with_titles() {
    let h = Harness::new();
    h.remote.put_user(profile("bob", "Bob")).await;
    h.remote.put_user(profile("carol", "Carol")).await;

    let with_bob = h
        .state
        .conversations
        .get_or_create_direct("alice", "bob")
        .await
        .unwrap();
    let with_carol = h
        .state
        .conversations
        .get_or_create_direct("alice", "carol")
        .await
        .unwrap();
    let members = vec!["bob".to_string(), "carol".to_string()];
    let group = h
        .state
        .conversations
        .create_group("alice", &members, "Trip")
        .await
        .unwrap();

    // Activity order after these sends: bob (newest), group, carol.
    for conversation_id in [&with_carol.id, &group.id, &with_bob.id] {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let pending = h
            .state
            .messages
            .send_text(conversation_id, &alice(), "hey")
            .unwrap();
        assert!(matches!(pending.outcome.await.unwrap(), SendOutcome::Sent { .. }));
        remote_preview(&h.remote, conversation_id, "hey").await;
    }

    let list = h.state.conversations.list_for_user("alice").await;
    let titles: Vec<&str> = list.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Bob", "Trip", "Carol"]);
    assert!(list
        .windows(2)
        .all(|w| w[0].conversation.last_activity >= w[1].conversation.last_activity));
    assert!(list.iter().all(|s| !s.unread));

    // Same ordering from the cache when the remote store is unreachable.
    h.remote.set_reachable(false);
    let cached = h.state.conversations.list_for_user("alice").await;
    let ids: Vec<&str> = cached.iter().map(|s| s.conversation.id.as_str()).collect();
    assert_eq!(ids, vec![with_bob.id.as_str(), group.id.as_str(), with_carol.id.as_str()]);
    assert_eq!(cached[0].title, "Bob");
}

#[tokio::test]
async fn typing_is_published() {
    let h = Harness::new();
    h.state.conversations.set_typing("alice_bob", "alice", true).await;
    assert_eq!(h.remote.typing_users("alice_bob").await, vec!["alice"]);

    h.state.conversations.set_typing("alice_bob", "alice", false).await;
    assert!(h.remote.typing_users("alice_bob").await.is_empty());
}
