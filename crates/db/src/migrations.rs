use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR, DbPool};

    const MANAGED_OBJECTS: &[&str] =
        &["tickets", "ticket_config", "idx_tickets_trigger_message_id"];

    async fn fresh_pool() -> DbPool {
        connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect")
    }

    async fn table_exists(pool: &DbPool, name: &str) -> bool {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("probe sqlite_master")
            .get::<i64, _>("count")
            == 1
    }

    async fn schema_snapshot(pool: &DbPool) -> Vec<(String, String, String)> {
        let rows = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql FROM sqlite_master \
             WHERE type IN ('table', 'index') ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .expect("read sqlite_master");

        rows.iter()
            .map(|row| {
                (
                    row.get::<String, _>("type"),
                    row.get::<String, _>("name"),
                    row.get::<String, _>("sql"),
                )
            })
            .filter(|(_, name, _)| MANAGED_OBJECTS.contains(&name.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn fresh_database_gets_tickets_schema() {
        let pool = fresh_pool().await;
        run_pending(&pool).await.expect("run migrations");

        assert!(table_exists(&pool, "tickets").await);
        assert!(table_exists(&pool, "ticket_config").await);
    }

    #[tokio::test]
    async fn migrations_seed_the_config_singleton() {
        let pool = fresh_pool().await;
        run_pending(&pool).await.expect("run migrations");

        let row = sqlx::query(
            "SELECT setup_message_id, ticket_count FROM ticket_config WHERE id = 1",
        )
        .fetch_one(&pool)
        .await
        .expect("singleton row exists");

        assert_eq!(row.get::<Option<i64>, _>("setup_message_id"), None);
        assert_eq!(row.get::<i64, _>("ticket_count"), 0);
    }

    #[tokio::test]
    async fn reapplying_migrations_is_a_noop() {
        let pool = fresh_pool().await;
        run_pending(&pool).await.expect("run migrations");
        run_pending(&pool).await.expect("second run is a no-op");

        let applied = sqlx::query("SELECT COUNT(*) AS count FROM _sqlx_migrations")
            .fetch_one(&pool)
            .await
            .expect("read applied migrations")
            .get::<i64, _>("count");
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn full_undo_drops_the_tickets_schema() {
        let pool = fresh_pool().await;
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        assert!(!table_exists(&pool, "tickets").await);
        assert!(!table_exists(&pool, "ticket_config").await);
    }

    #[tokio::test]
    async fn undo_then_redo_restores_identical_schema() {
        let pool = fresh_pool().await;
        run_pending(&pool).await.expect("run migrations");
        let baseline = schema_snapshot(&pool).await;
        assert_eq!(baseline.len(), MANAGED_OBJECTS.len());

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        assert!(schema_snapshot(&pool).await.is_empty());

        run_pending(&pool).await.expect("redo migrations");
        assert_eq!(schema_snapshot(&pool).await, baseline);
    }
}
