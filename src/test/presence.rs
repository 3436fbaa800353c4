use crate::*;

#[tokio::test]
async fn join_sync_and_leave_round_trip() {
    let backend = MemoryBackend::new();

    let mut alice = PresenceTracker::new("alice");
    alice.join(&backend, "lobby").await.unwrap();
    alice.process_events();
    assert_eq!(alice.online_users(), ["alice"]);

    let mut bob = PresenceTracker::new("bob");
    bob.join(&backend, "lobby").await.unwrap();
    bob.process_events();
    alice.process_events();
    assert_eq!(alice.online_users(), ["alice", "bob"]);
    assert_eq!(bob.online_users(), ["alice", "bob"]);

    bob.leave(&backend).await.unwrap();
    alice.process_events();
    assert_eq!(alice.online_users(), ["alice"]);
    assert!(bob.online_users().is_empty());
}

#[tokio::test]
async fn duplicate_join_is_deduplicated() {
    let backend = MemoryBackend::new();

    let mut alice = PresenceTracker::new("alice");
    alice.join(&backend, "lobby").await.unwrap();

    // Same user id joins again from a second session.
    let mut alice_tablet = PresenceTracker::new("alice");
    alice_tablet.join(&backend, "lobby").await.unwrap();

    alice.process_events();
    assert_eq!(alice.online_users(), ["alice"]);

    // A later joiner sees the id once despite two sessions in the roster.
    let mut carol = PresenceTracker::new("carol");
    carol.join(&backend, "lobby").await.unwrap();
    carol.process_events();
    assert_eq!(carol.online_users(), ["alice", "carol"]);
}

#[tokio::test]
async fn channels_are_isolated() {
    let backend = MemoryBackend::new();

    let mut alice = PresenceTracker::new("alice");
    alice.join(&backend, "lobby").await.unwrap();

    let mut bob = PresenceTracker::new("bob");
    bob.join(&backend, "standup").await.unwrap();
    bob.process_events();
    assert_eq!(bob.online_users(), ["bob"]);

    alice.process_events();
    assert_eq!(alice.online_users(), ["alice"]);
}

#[tokio::test]
async fn leave_is_idempotent() {
    let backend = MemoryBackend::new();

    let mut alice = PresenceTracker::new("alice");
    alice.join(&backend, "lobby").await.unwrap();
    alice.leave(&backend).await.unwrap();
    alice.leave(&backend).await.unwrap();
    assert!(alice.online_users().is_empty());
}
