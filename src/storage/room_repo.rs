use crate::domain::message::{Attachment, NewAttachment};
use crate::domain::room::{GroupMessageView, RoomView};
use crate::domain::user::UserRef;
use crate::error::Result;
use crate::storage::DbPool;
use sqlx::FromRow;
use std::collections::BTreeSet;
use time::OffsetDateTime;

const GROUP_VIEW_COLUMNS: &str = r#"
    m.id, m.room_id, m.sender_id, su.display_name AS sender_name,
    m.content, m.read, m.created_at,
    a.id AS attachment_id, a.stored_name, a.original_name,
    a.content_type, a.size_bytes, a.public_path
    FROM group_messages m
    JOIN users su ON su.id = m.sender_id
    LEFT JOIN attachments a ON a.group_message_id = m.id
"#;

#[derive(Debug, FromRow)]
struct GroupMessageRow {
    id: i64,
    room_id: i64,
    sender_id: i64,
    sender_name: String,
    content: String,
    read: bool,
    created_at: OffsetDateTime,
    attachment_id: Option<i64>,
    stored_name: Option<String>,
    original_name: Option<String>,
    content_type: Option<String>,
    size_bytes: Option<i64>,
    public_path: Option<String>,
}

impl From<GroupMessageRow> for GroupMessageView {
    fn from(row: GroupMessageRow) -> Self {
        let attachment = match (
            row.attachment_id,
            row.stored_name,
            row.original_name,
            row.content_type,
            row.size_bytes,
            row.public_path,
        ) {
            (Some(id), Some(stored), Some(original), Some(content_type), Some(size), Some(path)) => {
                Some(Attachment {
                    id,
                    stored_name: stored,
                    original_name: original,
                    content_type,
                    size_bytes: size,
                    public_path: path,
                })
            }
            _ => None,
        };

        Self {
            id: row.id,
            room_id: row.room_id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            content: row.content,
            read: row.read,
            created_at: row.created_at,
            attachment,
        }
    }
}

#[derive(Debug, FromRow)]
struct RoomRow {
    id: i64,
    name: String,
    creator_id: i64,
    creator_name: String,
    created_at: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct RoomRepository {
    pool: DbPool,
}

impl RoomRepository {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Creates a room and its initial membership atomically. The creator is
    /// always part of the member set; duplicate ids collapse. A failure
    /// anywhere rolls the whole operation back, so a room can never exist
    /// with zero members.
    pub async fn create(&self, name: &str, creator_id: i64, member_ids: &[i64]) -> Result<i64> {
        let mut members: BTreeSet<i64> = member_ids.iter().copied().collect();
        members.insert(creator_id);

        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO rooms (name, creator_id, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(creator_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let room_id = result.last_insert_rowid();

        for user_id in members {
            sqlx::query("INSERT INTO room_members (room_id, user_id, created_at) VALUES (?, ?, ?)")
                .bind(room_id)
                .bind(user_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(room_id)
    }

    pub async fn exists(&self, room_id: i64) -> Result<bool> {
        let row = sqlx::query_as::<_, (i64,)>("SELECT id FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    pub async fn find_view(&self, room_id: i64) -> Result<Option<RoomView>> {
        let Some(room) = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT r.id, r.name, r.creator_id, u.display_name AS creator_name, r.created_at
            FROM rooms r JOIN users u ON u.id = r.creator_id
            WHERE r.id = ?
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let members = self.members(room_id).await?;

        Ok(Some(RoomView {
            id: room.id,
            name: room.name,
            creator: UserRef { id: room.creator_id, display_name: room.creator_name },
            members,
            created_at: room.created_at,
        }))
    }

    pub async fn rooms_for_user(&self, user_id: i64) -> Result<Vec<RoomView>> {
        let room_ids = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT r.id FROM rooms r
            JOIN room_members rm ON rm.room_id = r.id
            WHERE rm.user_id = ?
            ORDER BY r.created_at ASC, r.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rooms = Vec::with_capacity(room_ids.len());
        for (room_id,) in room_ids {
            if let Some(view) = self.find_view(room_id).await? {
                rooms.push(view);
            }
        }

        Ok(rooms)
    }

    pub async fn members(&self, room_id: i64) -> Result<Vec<UserRef>> {
        let members = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT u.id, u.display_name FROM room_members rm
            JOIN users u ON u.id = rm.user_id
            WHERE rm.room_id = ?
            ORDER BY u.id ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members.into_iter().map(|(id, display_name)| UserRef { id, display_name }).collect())
    }

    pub async fn member_ids(&self, room_id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_as::<_, (i64,)>(
            "SELECT user_id FROM room_members WHERE room_id = ? ORDER BY user_id ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    pub async fn is_member(&self, room_id: i64, user_id: i64) -> Result<bool> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT user_id FROM room_members WHERE room_id = ? AND user_id = ?",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Inserts membership rows for users not already members (idempotent
    /// union). Returns the ids that were actually added.
    pub async fn add_members(&self, room_id: i64, user_ids: &[i64]) -> Result<Vec<i64>> {
        let requested: BTreeSet<i64> = user_ids.iter().copied().collect();

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, (i64,)>(
            "SELECT user_id FROM room_members WHERE room_id = ?",
        )
        .bind(room_id)
        .fetch_all(&mut *tx)
        .await?;
        let existing: BTreeSet<i64> = existing.into_iter().map(|(id,)| id).collect();

        let now = OffsetDateTime::now_utc();
        let mut added = Vec::new();
        for user_id in requested.difference(&existing).copied() {
            sqlx::query(
                "INSERT OR IGNORE INTO room_members (room_id, user_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(room_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            added.push(user_id);
        }

        tx.commit().await?;
        Ok(added)
    }

    /// Idempotent: removing a user who is not a member is a no-op.
    pub async fn remove_member(&self, room_id: i64, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Memberships and group messages go with the room via schema cascade.
    pub async fn delete(&self, room_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Persists a group message and its optional attachment atomically.
    pub async fn create_message(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
        attachment: Option<&NewAttachment>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO group_messages (room_id, sender_id, content, read, created_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(content)
        .bind(OffsetDateTime::now_utc())
        .execute(&mut *tx)
        .await?;

        let message_id = result.last_insert_rowid();

        if let Some(file) = attachment {
            sqlx::query(
                r#"
                INSERT INTO attachments
                    (group_message_id, stored_name, original_name, content_type, size_bytes, public_path)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(message_id)
            .bind(&file.stored_name)
            .bind(&file.original_name)
            .bind(&file.content_type)
            .bind(file.size_bytes)
            .bind(&file.public_path)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(message_id)
    }

    pub async fn find_message_view(&self, message_id: i64) -> Result<Option<GroupMessageView>> {
        let row = sqlx::query_as::<_, GroupMessageRow>(&format!(
            "SELECT {GROUP_VIEW_COLUMNS} WHERE m.id = ?"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Full message history for a room, oldest first. Rooms are assumed
    /// bounded in history; pagination is a known scaling limitation.
    pub async fn room_messages(&self, room_id: i64) -> Result<Vec<GroupMessageView>> {
        let rows = sqlx::query_as::<_, GroupMessageRow>(&format!(
            r#"
            SELECT {GROUP_VIEW_COLUMNS}
            WHERE m.room_id = ?
            ORDER BY m.created_at ASC, m.id ASC
            "#
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Flips the message-global read flag on every message in the room not
    /// authored by the viewer. Because the flag is not per-member, this
    /// makes the room appear read to every member.
    pub async fn mark_messages_read(&self, room_id: i64, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE group_messages SET read = 1
            WHERE room_id = ? AND sender_id != ? AND read = 0
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Per membership room, count of unread messages not authored by the
    /// user.
    pub async fn unread_counts(&self, user_id: i64) -> Result<Vec<(i64, i64)>> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT gm.room_id, COUNT(*) FROM group_messages gm
            JOIN room_members rm ON rm.room_id = gm.room_id AND rm.user_id = ?
            WHERE gm.read = 0 AND gm.sender_id != ?
            GROUP BY gm.room_id
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}
