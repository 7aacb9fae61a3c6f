use crate::domain::message::DirectMessageView;
use crate::domain::notification::Notification;
use crate::domain::room::{GroupMessageView, RoomView};
use serde::{Deserialize, Serialize};

/// Events a client may send over its gateway connection.
///
/// Frames are JSON objects of the form `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    DirectMessageSend { receiver_id: i64, content: String },
    #[serde(rename_all = "camelCase")]
    GroupMessageSend { room_id: i64, content: String },
    JoinRoom(i64),
    LeaveRoom(i64),
}

/// Events fanned out to gateway subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    NewDirectMessage(DirectMessageView),
    NewGroupMessage(GroupMessageView),
    /// Counterpart read-state changed; clients re-fetch unread counts.
    MessagesRead {},
    #[serde(rename_all = "camelCase")]
    GroupMessagesRead { room_id: i64, user_id: i64 },
    RoomCreated(RoomView),
    AddedToRoom(RoomView),
    #[serde(rename_all = "camelCase")]
    RemovedFromRoom { room_id: i64 },
    #[serde(rename_all = "camelCase")]
    RoomDeleted { room_id: i64 },
    #[serde(rename_all = "camelCase")]
    TaskAssigned { notification: Notification, unread_count: i64 },
    #[serde(rename_all = "camelCase")]
    NotificationRead { notification_id: String, unread_count: i64 },
    #[serde(rename_all = "camelCase")]
    PresenceChange { user_id: i64, is_online: bool },
    /// Delivered only to the connection whose action failed.
    Error { message: String },
}
