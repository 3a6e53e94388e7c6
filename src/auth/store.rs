//! Credential store: user records keyed by email

use sqlx::SqlitePool;
use tracing::{debug, error};

use super::models::User;
use crate::common::{generate_user_id, safe_email_log};

/// Fields of a record about to be written
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub picture: String,
    pub provider: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    Duplicate,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Clone, Debug)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, picture, provider, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, email = %safe_email_log(email), "Database error looking up user");
            e
        })
    }

    /// Insert a new record. A duplicate email surfaces as `StoreError::Duplicate`.
    pub async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        let id = generate_user_id();
        let result = sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, picture, provider) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.password_hash.as_deref())
        .bind(&user.picture)
        .bind(user.provider)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(email = %safe_email_log(&user.email), "Insert rejected by unique constraint");
                return Err(StoreError::Duplicate);
            }
            Err(e) => return Err(StoreError::Database(e)),
        }

        self.fetch_by_id(&id).await.map_err(StoreError::Database)
    }

    /// Insert unless a record with this email already exists; an existing record
    /// is left untouched. Returns `true` when a row was created.
    pub async fn insert_if_absent(&self, user: &NewUser) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, picture, provider)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(email) DO NOTHING
            "#,
        )
        .bind(generate_user_id())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.password_hash.as_deref())
        .bind(&user.picture)
        .bind(user.provider)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fetch_by_id(&self, id: &str) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, picture, provider, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
    }

    #[cfg(test)]
    pub async fn count(&self) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .unwrap();
        count
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> UserStore {
    use sqlx::sqlite::SqlitePoolOptions;

    // One connection: every `sqlite::memory:` connection is its own database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::common::migrations::create_user_tables(&pool)
        .await
        .unwrap();
    UserStore::new(pool)
}
