//! `PostgreSQL` implementation of the `OutboxRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use courier_core::error::OutboxError;
use courier_core::outbox::{
    FailureOutcome, MarkOutcome, NewOutboxMessage, OutboxMessage, OutboxStatus,
};
use courier_core::repository::OutboxRepository;

use crate::schema::CREATE_OUTBOX_TABLE;

/// Row shape of `outbox_messages`.
#[derive(Debug, FromRow)]
struct OutboxRow {
    id: Uuid,
    topic: String,
    payload: sqlx::types::Json<serde_json::Value>,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<OutboxRow> for OutboxMessage {
    type Error = OutboxError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            topic: row.topic,
            payload: row.payload.0,
            status: row.status.parse()?,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            sent_at: row.sent_at,
        })
    }
}

pub(crate) fn db_error(err: sqlx::Error) -> OutboxError {
    OutboxError::Database(err.to_string())
}

/// PostgreSQL-backed outbox repository.
#[derive(Debug, Clone)]
pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    /// Creates a new `PgOutboxRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a pending row on the caller's connection.
    ///
    /// Pass the business transaction (`&mut *tx`) so the row commits or rolls
    /// back together with the entity mutation. This function never begins or
    /// commits a transaction of its own.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::Database` if the insert fails.
    pub async fn add(conn: &mut PgConnection, message: &NewOutboxMessage) -> Result<(), OutboxError> {
        sqlx::query(
            "INSERT INTO outbox_messages (id, topic, payload, status, created_at) \
             VALUES ($1, $2, $3, 'PENDING', $4)",
        )
        .bind(message.id)
        .bind(&message.topic)
        .bind(&message.payload)
        .bind(message.created_at)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

        tracing::debug!(outbox_id = %message.id, topic = %message.topic, "outbox row recorded");
        Ok(())
    }

    /// Creates the outbox table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::Database` if the DDL fails.
    pub async fn create_schema(&self) -> Result<(), OutboxError> {
        sqlx::raw_sql(CREATE_OUTBOX_TABLE)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// Loads a single row regardless of status.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError` if the query or row decoding fails.
    pub async fn find(&self, id: Uuid) -> Result<Option<OutboxMessage>, OutboxError> {
        let row: Option<OutboxRow> = sqlx::query_as(
            "SELECT id, topic, payload, status, attempts, last_error, created_at, sent_at \
             FROM outbox_messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(OutboxMessage::try_from).transpose()
    }
}

#[async_trait]
impl OutboxRepository for PgOutboxRepository {
    async fn get_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>, OutboxError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<OutboxRow> = sqlx::query_as(
            "SELECT id, topic, payload, status, attempts, last_error, created_at, sent_at \
             FROM outbox_messages \
             WHERE status = 'PENDING' \
             ORDER BY seq \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(OutboxMessage::try_from).collect()
    }

    async fn get_pending_after(
        &self,
        after: Uuid,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<OutboxRow> = sqlx::query_as(
            "SELECT id, topic, payload, status, attempts, last_error, created_at, sent_at \
             FROM outbox_messages \
             WHERE status = 'PENDING' \
               AND seq > (SELECT seq FROM outbox_messages WHERE id = $1) \
             ORDER BY seq \
             LIMIT $2",
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(OutboxMessage::try_from).collect()
    }

    async fn mark_sent(&self, id: Uuid) -> Result<MarkOutcome, OutboxError> {
        let result = sqlx::query(
            "UPDATE outbox_messages SET status = 'SENT', sent_at = NOW() \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            Ok(MarkOutcome::NoMatch)
        } else {
            Ok(MarkOutcome::Marked)
        }
    }

    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        max_attempts: Option<u32>,
    ) -> Result<FailureOutcome, OutboxError> {
        let max_attempts = max_attempts.map(|n| i32::try_from(n).unwrap_or(i32::MAX));
        let row: Option<(i32, String)> = sqlx::query_as(
            "UPDATE outbox_messages \
             SET attempts = attempts + 1, \
                 last_error = $2, \
                 status = CASE \
                     WHEN $3::INTEGER IS NOT NULL AND attempts + 1 >= $3::INTEGER THEN 'DEAD' \
                     ELSE status \
                 END \
             WHERE id = $1 AND status = 'PENDING' \
             RETURNING attempts, status",
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some((attempts, status)) = row else {
            return Ok(FailureOutcome::NoMatch);
        };

        match status.parse::<OutboxStatus>()? {
            OutboxStatus::Dead => Ok(FailureOutcome::Dead { attempts }),
            _ => Ok(FailureOutcome::Retrying { attempts }),
        }
    }

    async fn pending_count(&self) -> Result<i64, OutboxError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox_messages WHERE status = 'PENDING'")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }
}
