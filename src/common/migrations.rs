// src/common/migrations.rs
//! Database schema management

use sqlx::SqlitePool;
use tracing::{info, warn};

/// Create the credential store schema.
///
/// Idempotent: every statement is `IF NOT EXISTS`. Tables are dropped first only
/// when `reset` is set (`RESET_DB=true`).
pub async fn run_migrations(pool: &SqlitePool, reset: bool) -> Result<(), sqlx::Error> {
    if reset {
        warn!("RESET_DB=true - dropping users table and recreating schema");
        sqlx::query("DROP TABLE IF EXISTS users")
            .execute(pool)
            .await?;
    }

    create_user_tables(pool).await?;

    info!("Database migration completed successfully");
    Ok(())
}

/// The UNIQUE constraint on `email` is what keeps concurrent registrations
/// and federated sign-ins from creating two records for one address.
pub async fn create_user_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT '',
            password_hash TEXT,
            picture TEXT NOT NULL DEFAULT '',
            provider TEXT NOT NULL DEFAULT 'local',
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_provider ON users(provider)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await;
        create_user_tables(&pool).await.unwrap();
        create_user_tables(&pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    async fn user_count(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[tokio::test]
    async fn test_run_migrations_keeps_or_resets_data() {
        let pool = memory_pool().await;
        run_migrations(&pool, false).await.unwrap();
        sqlx::query("INSERT INTO users (id, email) VALUES ('U_1', 'a@example.com')")
            .execute(&pool)
            .await
            .unwrap();

        run_migrations(&pool, false).await.unwrap();
        assert_eq!(user_count(&pool).await, 1);

        run_migrations(&pool, true).await.unwrap();
        assert_eq!(user_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_email_unique_constraint() {
        let pool = memory_pool().await;
        create_user_tables(&pool).await.unwrap();

        sqlx::query("INSERT INTO users (id, email) VALUES ('U_1', 'a@example.com')")
            .execute(&pool)
            .await
            .unwrap();
        let dup = sqlx::query("INSERT INTO users (id, email) VALUES ('U_2', 'a@example.com')")
            .execute(&pool)
            .await;
        assert!(dup.is_err());
    }
}
