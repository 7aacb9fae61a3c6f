use crate::domain::notification::{Notification, NotificationData, PushSubscription};
use crate::error::{AppError, Result};
use crate::storage::DbPool;
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: String,
    user_id: i64,
    title: String,
    body: String,
    data: String,
    read: bool,
    created_at: OffsetDateTime,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        let data: NotificationData = serde_json::from_str(&row.data)
            .map_err(|e| AppError::Internal(format!("Malformed notification payload: {e}")))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            body: row.body,
            data,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone, Debug)]
pub struct NotificationRepository {
    pool: DbPool,
}

impl NotificationRepository {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, notification: &Notification) -> Result<()> {
        let data = serde_json::to_string(&notification.data)
            .map_err(|e| AppError::Internal(format!("Failed to encode notification payload: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, title, body, data, read, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&notification.id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(data)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, title, body, data, read, created_at
            FROM notifications WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Owner-constrained: marking another user's notification matches zero
    /// rows and is silently a no-op.
    pub async fn mark_read(&self, user_id: i64, notification_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Upsert keyed on endpoint uniqueness: re-subscribing with the same
    /// endpoint updates the existing row instead of duplicating it.
    pub async fn upsert_subscription(
        &self,
        user_id: i64,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<PushSubscription> {
        sqlx::query(
            r#"
            INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (endpoint) DO UPDATE SET
                user_id = excluded.user_id,
                p256dh = excluded.p256dh,
                auth = excluded.auth
            "#,
        )
        .bind(user_id)
        .bind(endpoint)
        .bind(p256dh)
        .bind(auth)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?;

        let subscription = sqlx::query_as::<_, (i64, i64, String, String, String)>(
            "SELECT id, user_id, endpoint, p256dh, auth FROM push_subscriptions WHERE endpoint = ?",
        )
        .bind(endpoint)
        .fetch_one(&self.pool)
        .await?;

        let (id, user_id, endpoint, p256dh, auth) = subscription;
        Ok(PushSubscription { id, user_id, endpoint, p256dh, auth })
    }

    pub async fn subscriptions_for_user(&self, user_id: i64) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query_as::<_, (i64, i64, String, String, String)>(
            "SELECT id, user_id, endpoint, p256dh, auth FROM push_subscriptions WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, endpoint, p256dh, auth)| PushSubscription {
                id,
                user_id,
                endpoint,
                p256dh,
                auth,
            })
            .collect())
    }

    /// Prunes an endpoint the provider reported as no longer registered.
    pub async fn delete_subscription(&self, endpoint: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?")
            .bind(endpoint)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
