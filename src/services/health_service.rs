use crate::config::HealthConfig;
use crate::storage::DbPool;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct HealthService {
    pool: DbPool,
    config: HealthConfig,
}

impl HealthService {
    #[must_use]
    pub fn new(pool: DbPool, config: HealthConfig) -> Self {
        Self { pool, config }
    }

    /// Checks database connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the database is
    /// unreachable within the configured timeout.
    pub async fn check_db(&self) -> Result<(), String> {
        let db_timeout = Duration::from_millis(self.config.db_timeout_ms);

        match timeout(db_timeout, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(format!("Database connection failed: {e:?}")),
            Err(_) => Err("Database connection timed out".to_string()),
        }
    }
}
