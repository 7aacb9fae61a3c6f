use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

pub mod message_repo;
pub mod notification_repo;
pub mod room_repo;
pub mod user_repo;

pub type DbPool = Pool<Sqlite>;

/// Initializes the database connection pool.
///
/// Foreign keys are enabled on every connection; membership and message
/// cascades depend on it.
///
/// # Errors
/// Returns `sqlx::Error` if the connection fails.
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new().max_connections(5).connect_with(options).await
}

/// Applies pending schema migrations.
///
/// # Errors
/// Returns a `MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}
