use crate::domain::message::Attachment;
use crate::domain::user::UserRef;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A room joined with its creator and full member list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: i64,
    pub name: String,
    pub creator: UserRef,
    pub members: Vec<UserRef>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A group message joined with its sender's display identity.
///
/// The `read` flag is message-global: any member viewing the room flips it
/// for all messages from other senders, so unread state is approximate in
/// rooms with more than two members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessageView {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub attachment: Option<Attachment>,
}
