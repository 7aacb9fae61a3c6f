use crate::domain::user::UserRef;
use crate::error::Result;
use crate::storage::DbPool;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Mirrors a platform user into the store so message and room rows can
    /// reference it. Idempotent; a changed display name is taken over.
    pub async fn upsert(&self, user_id: i64, display_name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, display_name, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET display_name = excluded.display_name
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(&self, user_id: i64) -> Result<Option<UserRef>> {
        let user = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, display_name FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user.map(|(id, display_name)| UserRef { id, display_name }))
    }
}
