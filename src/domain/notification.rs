use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Reference to a task raised by the task subsystem. Only the fields the
/// notification payload needs cross the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub id: i64,
    pub title: String,
}

/// Structured payload carried by a notification: a type tag plus an
/// optional task reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub data: NotificationData,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One registered push endpoint per browser/device, upserted by endpoint
/// uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub id: i64,
    pub user_id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}
