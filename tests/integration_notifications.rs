mod common;

use common::{RecordingBroadcaster, RecordingPushProvider, build_test_services, get_test_pool, seed_user};
use huddle_server::domain::notification::TaskRef;
use huddle_server::realtime::ServerEvent;
use std::sync::Arc;

#[tokio::test]
async fn task_assignment_persists_and_emits_with_count() {
    let pool = get_test_pool().await;
    seed_user(&pool, 1, "Alice").await;

    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let push = Arc::new(RecordingPushProvider::new());
    let (_, _, notifications) = build_test_services(&pool, &broadcaster, &push);

    let task = TaskRef { id: 42, title: "Write the sprint report".to_string() };
    let created = notifications.notify_task_assignment(1, task).await.expect("notify failed");

    assert_eq!(created.user_id, 1);
    assert_eq!(created.data.kind, "task-assigned");
    assert_eq!(created.data.task.as_ref().map(|t| t.id), Some(42));
    assert!(!created.read);

    assert_eq!(notifications.get_unread_count(1).await.expect("count failed"), 1);

    let listed = notifications.list_notifications(1).await.expect("list failed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);

    let events = broadcaster.events_for_user(1);
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::TaskAssigned { notification, unread_count: 1 } if notification.id == created.id
    )));
}

#[tokio::test]
async fn task_status_notifications_carry_their_own_kind() {
    let pool = get_test_pool().await;
    seed_user(&pool, 1, "Alice").await;

    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let push = Arc::new(RecordingPushProvider::new());
    let (_, _, notifications) = build_test_services(&pool, &broadcaster, &push);

    let task = TaskRef { id: 7, title: "Deploy staging".to_string() };
    let created = notifications.notify_task_status(1, task, "done").await.expect("notify failed");

    assert_eq!(created.data.kind, "task-status");
    assert!(created.body.contains("done"));
}

#[tokio::test]
async fn one_failing_endpoint_does_not_abort_the_others() {
    let pool = get_test_pool().await;
    seed_user(&pool, 1, "Alice").await;

    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let push = Arc::new(RecordingPushProvider::new());
    let (_, _, notifications) = build_test_services(&pool, &broadcaster, &push);

    notifications
        .save_subscription(1, "https://push.example/dead", "k1", "a1")
        .await
        .expect("subscribe failed");
    notifications
        .save_subscription(1, "https://push.example/alive", "k2", "a2")
        .await
        .expect("subscribe failed");

    push.mark_unregistered("https://push.example/dead");

    let task = TaskRef { id: 9, title: "Review PR".to_string() };
    notifications.notify_task_assignment(1, task).await.expect("push failure must not surface");

    let delivered = push.delivered_endpoints();
    assert_eq!(delivered, vec!["https://push.example/alive".to_string()]);

    // The dead endpoint is pruned so it is not retried forever.
    let (remaining,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM push_subscriptions WHERE user_id = 1")
            .fetch_one(&pool)
            .await
            .expect("count failed");
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn resubscribing_the_same_endpoint_upserts() {
    let pool = get_test_pool().await;
    seed_user(&pool, 1, "Alice").await;

    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let push = Arc::new(RecordingPushProvider::new());
    let (_, _, notifications) = build_test_services(&pool, &broadcaster, &push);

    let first = notifications
        .save_subscription(1, "https://push.example/browser", "old-key", "old-auth")
        .await
        .expect("subscribe failed");
    let second = notifications
        .save_subscription(1, "https://push.example/browser", "new-key", "new-auth")
        .await
        .expect("subscribe failed");

    assert_eq!(first.id, second.id, "same endpoint must reuse the existing row");
    assert_eq!(second.p256dh, "new-key");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM push_subscriptions")
        .fetch_one(&pool)
        .await
        .expect("count failed");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn marking_read_is_owner_constrained() {
    let pool = get_test_pool().await;
    seed_user(&pool, 1, "Alice").await;
    seed_user(&pool, 2, "Bob").await;

    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let push = Arc::new(RecordingPushProvider::new());
    let (_, _, notifications) = build_test_services(&pool, &broadcaster, &push);

    let task = TaskRef { id: 1, title: "Fix login".to_string() };
    let created = notifications.notify_task_assignment(1, task).await.expect("notify failed");

    // Another user marking this id matches zero rows and fails silently.
    notifications.mark_notification_read(2, &created.id).await.expect("cross-user mark must not raise");
    assert_eq!(notifications.get_unread_count(1).await.expect("count failed"), 1);

    let remaining = notifications.mark_notification_read(1, &created.id).await.expect("mark failed");
    assert_eq!(remaining, 0);
    assert_eq!(notifications.get_unread_count(1).await.expect("count failed"), 0);

    let events = broadcaster.events_for_user(1);
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::NotificationRead { notification_id, unread_count: 0 } if *notification_id == created.id
    )));
}
