//! `PostgreSQL` implementation of `UserStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::error::DomainError;
use courier_core::outbox::NewOutboxMessage;
use courier_outbox_store::PgOutboxRepository;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::domain::store::UserStore;
use crate::domain::user::User;

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            updated_at: row.updated_at,
        }
    }
}

fn db_error(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// PostgreSQL-backed user store.
///
/// Each call runs in its own transaction shared by the user statement and
/// the outbox insert.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Creates a new `PgUserStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads a user.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query fails.
    pub async fn find(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, updated_at FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &User, outbox: &NewOutboxMessage) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            "INSERT INTO users (id, name, created_at, updated_at) VALUES ($1, $2, $3, $3)",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                DomainError::Validation(format!("user {} already exists", user.id))
            } else {
                db_error(e)
            }
        })?;
        PgOutboxRepository::add(&mut tx, outbox).await?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn update(&self, user: &User, outbox: &NewOutboxMessage) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query("UPDATE users SET name = $2, updated_at = $3 WHERE id = $1")
            .bind(user.id)
            .bind(&user.name)
            .bind(user.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(user.id));
        }
        PgOutboxRepository::add(&mut tx, outbox).await?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, outbox: &NewOutboxMessage) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(user_id));
        }
        PgOutboxRepository::add(&mut tx, outbox).await?;

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}
