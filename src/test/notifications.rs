use crate::test::notif;
use crate::*;

fn insert_live(backend: &MemoryBackend, notification: &Notification) {
    backend.insert(
        NOTIFICATIONS_TABLE,
        Document::from_record(notification).unwrap(),
    );
}

#[tokio::test]
async fn baseline_window_is_newest_first_and_counts_unread() {
    let backend = MemoryBackend::new();
    backend
        .seed_records(
            NOTIFICATIONS_TABLE,
            &[
                notif("n1", "u1", true, 0),
                notif("n2", "u1", false, 10),
                notif("n3", "u1", false, 20),
                notif("n4", "u2", false, 30),
            ],
        )
        .unwrap();

    let mut store = NotificationStore::new("u1");
    store.start(&backend, &backend).await.unwrap();

    assert!(!store.loading());
    assert_eq!(store.unread_count(), 2);
    let ids: Vec<&str> = store.data().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["n3", "n2", "n1"]);
}

#[tokio::test]
async fn window_truncates_but_counter_counts_all_inserts() {
    let backend = MemoryBackend::new();
    let mut store = NotificationStore::with_opts("u1", NotifyOpts { limit: 2 });
    store.start(&backend, &backend).await.unwrap();

    insert_live(&backend, &notif("n1", "u1", false, 0));
    insert_live(&backend, &notif("n2", "u1", false, 10));
    insert_live(&backend, &notif("n3", "u1", false, 20));
    store.process_events();

    // The counter tracks event accounting, not the truncated window.
    assert_eq!(store.unread_count(), 3);
    let ids: Vec<&str> = store.data().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["n3", "n2"]);
}

#[tokio::test]
async fn read_transition_decrements_counter_once() {
    let backend = MemoryBackend::new();
    backend
        .seed_records(NOTIFICATIONS_TABLE, &[notif("n1", "u1", false, 0)])
        .unwrap();

    let mut store = NotificationStore::new("u1");
    store.start(&backend, &backend).await.unwrap();
    assert_eq!(store.unread_count(), 1);

    backend
        .update(NOTIFICATIONS_TABLE, "n1", doc! { "read" => true }.0)
        .await
        .unwrap();
    store.process_events();
    assert_eq!(store.unread_count(), 0);
    assert!(store.data()[0].read);

    // A second read->read update must not move the counter.
    backend
        .update(NOTIFICATIONS_TABLE, "n1", doc! { "read" => true }.0)
        .await
        .unwrap();
    store.process_events();
    assert_eq!(store.unread_count(), 0);
}

#[tokio::test]
async fn mark_read_waits_for_the_echoed_event() {
    let backend = MemoryBackend::new();
    backend
        .seed_records(NOTIFICATIONS_TABLE, &[notif("n1", "u1", false, 0)])
        .unwrap();

    let mut store = NotificationStore::new("u1");
    store.start(&backend, &backend).await.unwrap();

    store.mark_read(&backend, "n1").await.unwrap();
    // No local mutation until the Update event comes back around.
    assert_eq!(store.unread_count(), 1);
    assert!(!store.data()[0].read);

    store.process_events();
    assert_eq!(store.unread_count(), 0);
    assert!(store.data()[0].read);
}

#[tokio::test]
async fn mark_read_failure_leaves_state_unchanged() {
    let backend = MemoryBackend::new();
    backend
        .seed_records(NOTIFICATIONS_TABLE, &[notif("n1", "u1", false, 0)])
        .unwrap();

    let mut store = NotificationStore::new("u1");
    store.start(&backend, &backend).await.unwrap();

    assert!(store.mark_read(&backend, "nope").await.is_err());
    store.process_events();
    assert_eq!(store.unread_count(), 1);
    assert!(!store.data()[0].read);
}

#[tokio::test]
async fn mark_all_read_resets_counter_immediately() {
    let backend = MemoryBackend::new();
    backend
        .seed_records(
            NOTIFICATIONS_TABLE,
            &[
                notif("n1", "u1", false, 0),
                notif("n2", "u1", false, 10),
                notif("n3", "u1", true, 20),
            ],
        )
        .unwrap();

    let mut store = NotificationStore::new("u1");
    store.start(&backend, &backend).await.unwrap();
    assert_eq!(store.unread_count(), 2);

    let count = store.mark_all_read(&backend).await.unwrap();
    assert_eq!(count, 2);
    // Optimistic reset, before any echoed event has been drained.
    assert_eq!(store.unread_count(), 0);

    // The echoed read transitions then clamp at zero instead of going
    // negative.
    store.process_events();
    assert_eq!(store.unread_count(), 0);
    assert!(store.data().iter().all(|n| n.read));
}

#[tokio::test]
async fn cross_user_notifications_are_not_delivered() {
    let backend = MemoryBackend::new();
    let mut store = NotificationStore::new("u1");
    store.start(&backend, &backend).await.unwrap();

    insert_live(&backend, &notif("n1", "u2", false, 0));
    assert_eq!(store.process_events(), 0);
    assert_eq!(store.unread_count(), 0);
    assert!(store.data().is_empty());
}

#[tokio::test]
async fn refresh_reconciles_counter_after_missed_events() {
    let backend = MemoryBackend::new();
    backend
        .seed_records(
            NOTIFICATIONS_TABLE,
            &[notif("n1", "u1", false, 0), notif("n2", "u1", false, 10)],
        )
        .unwrap();

    let mut store = NotificationStore::new("u1");
    store.start(&backend, &backend).await.unwrap();
    assert_eq!(store.unread_count(), 2);

    // The read transition commits while the feed is down, so its echo never
    // arrives.
    backend.set_connection_state(ConnectionState::Disconnected);
    backend
        .update(NOTIFICATIONS_TABLE, "n1", doc! { "read" => true }.0)
        .await
        .unwrap();
    store.process_events();
    assert_eq!(store.unread_count(), 2); // stale until resync

    backend.set_connection_state(ConnectionState::Connected);
    store.refresh(&backend).await.unwrap();
    assert_eq!(store.unread_count(), 1);
}
