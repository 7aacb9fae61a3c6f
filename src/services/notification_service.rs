use crate::domain::notification::{Notification, NotificationData, PushSubscription, TaskRef};
use crate::error::Result;
use crate::push::{PushError, PushPayload, PushProvider};
use crate::realtime::{Broadcaster, ServerEvent};
use crate::storage::notification_repo::NotificationRepository;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Delivery notifier: durable notification log, best-effort push fan-out,
/// and unread-count accounting.
///
/// The sole inbound coupling from task/sprint logic is the pair of
/// `notify_*` entry points; everything else is client-facing.
#[derive(Clone, Debug)]
pub struct NotificationService {
    repo: NotificationRepository,
    push: Arc<dyn PushProvider>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl NotificationService {
    #[must_use]
    pub fn new(
        repo: NotificationRepository,
        push: Arc<dyn PushProvider>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self { repo, push, broadcaster }
    }

    /// Registers (or refreshes) a push endpoint for the user.
    pub async fn save_subscription(
        &self,
        user_id: i64,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<PushSubscription> {
        self.repo.upsert_subscription(user_id, endpoint, p256dh, auth).await
    }

    /// Raised by the task subsystem when a task is assigned to the user.
    #[tracing::instrument(err(level = "warn"), skip(self, task), fields(user_id = %user_id, task_id = %task.id))]
    pub async fn notify_task_assignment(&self, user_id: i64, task: TaskRef) -> Result<Notification> {
        let body = task.title.clone();
        let data = NotificationData { kind: "task-assigned".to_string(), task: Some(task) };
        self.publish(user_id, "New task assigned", body, data).await
    }

    /// Raised by the task subsystem when a task the user follows changes
    /// status.
    #[tracing::instrument(err(level = "warn"), skip(self, task), fields(user_id = %user_id, task_id = %task.id))]
    pub async fn notify_task_status(
        &self,
        user_id: i64,
        task: TaskRef,
        status: &str,
    ) -> Result<Notification> {
        let body = format!("{} is now {status}", task.title);
        let data = NotificationData { kind: "task-status".to_string(), task: Some(task) };
        self.publish(user_id, "Task status updated", body, data).await
    }

    /// Persists the notification (the operation succeeds once this commit
    /// lands), attempts push delivery to every registered endpoint, then
    /// emits the realtime event with the refreshed unread count.
    async fn publish(
        &self,
        user_id: i64,
        title: &str,
        body: String,
        data: NotificationData,
    ) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id,
            title: title.to_string(),
            body,
            data,
            read: false,
            created_at: OffsetDateTime::now_utc(),
        };

        self.repo.insert(&notification).await?;

        // Push is best-effort; nothing past this point can fail the
        // operation.
        self.deliver_push(&notification).await;

        let unread_count = self.repo.unread_count(user_id).await?;
        self.broadcaster.emit_to_user(
            user_id,
            &ServerEvent::TaskAssigned { notification: notification.clone(), unread_count },
        );

        Ok(notification)
    }

    /// Fans out one push attempt per subscription. All attempts settle
    /// before this returns; an individual failure is logged and never
    /// aborts delivery to the remaining endpoints.
    async fn deliver_push(&self, notification: &Notification) {
        let subscriptions = match self.repo.subscriptions_for_user(notification.user_id).await {
            Ok(subs) => subs,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load push subscriptions");
                return;
            }
        };

        if subscriptions.is_empty() {
            return;
        }

        let payload = PushPayload::from_notification(notification);
        let attempts = subscriptions.iter().map(|subscription| async {
            match self.push.send_push(subscription, &payload).await {
                Ok(()) => {
                    tracing::debug!(endpoint = %subscription.endpoint, "Push delivered");
                }
                Err(PushError::Unregistered) => {
                    tracing::info!(endpoint = %subscription.endpoint, "Endpoint unregistered, pruning");
                    if let Err(e) = self.repo.delete_subscription(&subscription.endpoint).await {
                        tracing::error!(error = %e, "Failed to prune unregistered endpoint");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, endpoint = %subscription.endpoint, "Push delivery failed");
                }
            }
        });

        futures::future::join_all(attempts).await;
    }

    pub async fn list_notifications(&self, user_id: i64) -> Result<Vec<Notification>> {
        self.repo.list_for_user(user_id).await
    }

    pub async fn get_unread_count(&self, user_id: i64) -> Result<i64> {
        self.repo.unread_count(user_id).await
    }

    /// Marks a notification read. Scoped to rows the user owns; a foreign
    /// id matches nothing and is silently ignored. Returns the refreshed
    /// unread count.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self),
        fields(user_id = %user_id, notification_id = %notification_id)
    )]
    pub async fn mark_notification_read(&self, user_id: i64, notification_id: &str) -> Result<i64> {
        self.repo.mark_read(user_id, notification_id).await?;

        let unread_count = self.repo.unread_count(user_id).await?;
        self.broadcaster.emit_to_user(
            user_id,
            &ServerEvent::NotificationRead {
                notification_id: notification_id.to_string(),
                unread_count,
            },
        );

        Ok(unread_count)
    }
}
