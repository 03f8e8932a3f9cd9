use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Executor;
use ticketry_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

const SESSION_PRAGMAS: &str = "\
    PRAGMA foreign_keys = ON;\n\
    PRAGMA journal_mode = WAL;\n\
    PRAGMA busy_timeout = 5000;";

/// Opens a pool using the sqlite settings from the application config. The
/// json backend never goes through here.
pub async fn connect_with_config(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute(sqlx::raw_sql(SESSION_PRAGMAS)).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
