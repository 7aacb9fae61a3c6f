use crate::domain::message::{Attachment, DirectMessageView, NewAttachment};
use crate::error::Result;
use crate::storage::DbPool;
use sqlx::FromRow;
use time::OffsetDateTime;

const VIEW_COLUMNS: &str = r#"
    m.id, m.sender_id, su.display_name AS sender_name,
    m.receiver_id, ru.display_name AS receiver_name,
    m.content, m.read, m.created_at,
    a.id AS attachment_id, a.stored_name, a.original_name,
    a.content_type, a.size_bytes, a.public_path
    FROM direct_messages m
    JOIN users su ON su.id = m.sender_id
    JOIN users ru ON ru.id = m.receiver_id
    LEFT JOIN attachments a ON a.direct_message_id = m.id
"#;

#[derive(Debug, FromRow)]
struct DirectMessageRow {
    id: i64,
    sender_id: i64,
    sender_name: String,
    receiver_id: i64,
    receiver_name: String,
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

impl From<DirectMessageRow> for DirectMessageView {
    fn from(row: DirectMessageRow) -> Self {
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
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            receiver_id: row.receiver_id,
            receiver_name: row.receiver_name,
            content: row.content,
            read: row.read,
            created_at: row.created_at,
            attachment,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Persists a direct message and its optional attachment atomically.
    /// Returns the new message id.
    pub async fn create(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
        attachment: Option<&NewAttachment>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO direct_messages (sender_id, receiver_id, content, read, created_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .bind(OffsetDateTime::now_utc())
        .execute(&mut *tx)
        .await?;

        let message_id = result.last_insert_rowid();

        if let Some(file) = attachment {
            sqlx::query(
                r#"
                INSERT INTO attachments
                    (direct_message_id, stored_name, original_name, content_type, size_bytes, public_path)
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

    pub async fn find_view(&self, message_id: i64) -> Result<Option<DirectMessageView>> {
        let row = sqlx::query_as::<_, DirectMessageRow>(&format!(
            "SELECT {VIEW_COLUMNS} WHERE m.id = ?"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Messages between two users in either direction, oldest first.
    pub async fn conversation(
        &self,
        user_a: i64,
        user_b: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DirectMessageView>> {
        let rows = sqlx::query_as::<_, DirectMessageRow>(&format!(
            r#"
            SELECT {VIEW_COLUMNS}
            WHERE (m.sender_id = ? AND m.receiver_id = ?)
               OR (m.sender_id = ? AND m.receiver_id = ?)
            ORDER BY m.created_at ASC, m.id ASC
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Conditional bulk update; re-running after all rows are read is a
    /// no-op. Returns the number of rows flipped.
    pub async fn mark_read(&self, receiver_id: i64, sender_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE direct_messages SET read = 1
            WHERE receiver_id = ? AND sender_id = ? AND read = 0
            "#,
        )
        .bind(receiver_id)
        .bind(sender_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Unread counts for a receiver, grouped by counterpart sender.
    pub async fn unread_counts(&self, user_id: i64) -> Result<Vec<(i64, i64)>> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT sender_id, COUNT(*) FROM direct_messages
            WHERE receiver_id = ? AND read = 0
            GROUP BY sender_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    pub async fn sender_of(&self, message_id: i64) -> Result<Option<i64>> {
        let sender = sqlx::query_as::<_, (i64,)>(
            "SELECT sender_id FROM direct_messages WHERE id = ?",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sender.map(|(id,)| id))
    }

    pub async fn delete(&self, message_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM direct_messages WHERE id = ?")
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Case-insensitive substring search, constrained to conversations the
    /// user participates in. The participant filter is a security
    /// invariant, not a convenience.
    pub async fn search(&self, user_id: i64, term: &str) -> Result<Vec<DirectMessageView>> {
        let rows = sqlx::query_as::<_, DirectMessageRow>(&format!(
            r#"
            SELECT {VIEW_COLUMNS}
            WHERE (m.sender_id = ? OR m.receiver_id = ?)
              AND instr(lower(m.content), lower(?)) > 0
            ORDER BY m.created_at ASC, m.id ASC
            "#
        ))
        .bind(user_id)
        .bind(user_id)
        .bind(term)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
