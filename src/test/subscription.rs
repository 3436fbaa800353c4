use crate::test::{task_row, Task};
use crate::*;

#[test]
fn close_releases_the_channel_once() {
    let backend = MemoryBackend::new();
    let mut sub: Subscription<Task> = Subscription::open(&backend, "tasks", None).unwrap();
    assert_eq!(backend.subscription_count(), 1);

    sub.close(&backend);
    assert!(sub.is_closed());
    assert_eq!(backend.subscription_count(), 0);

    // Second close is a no-op.
    sub.close(&backend);
    assert_eq!(backend.subscription_count(), 0);
}

#[test]
fn server_side_filtering_limits_delivery() {
    let backend = MemoryBackend::new();
    let mut sub: Subscription<Task> =
        Subscription::open(&backend, "tasks", Some(Filter::eq("assignee", "a"))).unwrap();

    backend.insert("tasks", task_row("t1", "pending", "a"));
    backend.insert("tasks", task_row("t2", "pending", "b"));

    let event = sub.poll().unwrap();
    assert_eq!(event.new_record.unwrap().id, "t1");
    assert!(sub.poll().is_none());
}

#[test]
fn client_side_filtering_when_feed_cannot_filter() {
    let backend = MemoryBackend::without_server_filters();
    let mut sub: Subscription<Task> =
        Subscription::open(&backend, "tasks", Some(Filter::eq("assignee", "a"))).unwrap();

    backend.insert("tasks", task_row("t1", "pending", "b"));
    backend.insert("tasks", task_row("t2", "pending", "a"));

    let event = sub.poll().unwrap();
    assert_eq!(event.new_record.unwrap().id, "t2");
    assert!(sub.poll().is_none());
}

#[test]
fn malformed_rows_are_skipped() {
    let backend = MemoryBackend::new();
    let mut sub: Subscription<Task> = Subscription::open(&backend, "tasks", None).unwrap();

    // No id at all, then an id with a payload that is not a task.
    backend.insert("tasks", doc! { "status" => "zombie" });
    backend.insert("tasks", doc! { "id" => "bad" });
    backend.insert("tasks", task_row("t1", "pending", "a"));

    let event = sub.poll().unwrap();
    assert_eq!(event.new_record.unwrap().id, "t1");
    assert!(sub.poll().is_none());
}

#[tokio::test]
async fn commit_order_is_preserved() {
    let backend = MemoryBackend::new();
    let mut sub: Subscription<Task> = Subscription::open(&backend, "tasks", None).unwrap();

    backend.insert("tasks", task_row("t1", "pending", "a"));
    backend.insert("tasks", task_row("t2", "pending", "a"));
    backend
        .update("tasks", "t1", doc! { "status" => "completed" }.0)
        .await
        .unwrap();

    let operations: Vec<Operation> = std::iter::from_fn(|| sub.poll())
        .map(|event| event.operation)
        .collect();
    assert_eq!(
        operations,
        [Operation::Insert, Operation::Insert, Operation::Update]
    );
}
