//! Commit notifications for new outbox rows.
//!
//! Every statement that inserts into `outbox_messages` sends a `NOTIFY` on
//! [`PENDING_CHANNEL`]. Postgres delivers it only when the inserting
//! transaction commits, so a notification never points at a row that is not
//! visible yet.

use sqlx::PgPool;
use sqlx::postgres::PgListener;

use courier_core::error::OutboxError;

use crate::pg_outbox_repository::db_error;

/// Channel the insert trigger notifies.
pub const PENDING_CHANNEL: &str = "outbox_pending";

/// A dedicated connection listening on [`PENDING_CHANNEL`].
#[derive(Debug)]
pub struct PendingListener {
    listener: PgListener,
}

impl PendingListener {
    /// Opens a listening connection from `pool`.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::Database` if the connection or `LISTEN` fails.
    pub async fn connect(pool: &PgPool) -> Result<Self, OutboxError> {
        let mut listener = PgListener::connect_with(pool).await.map_err(db_error)?;
        listener.listen(PENDING_CHANNEL).await.map_err(db_error)?;
        Ok(Self { listener })
    }

    /// Waits for the next committed insert.
    ///
    /// After a dropped connection this reconnects on the following call;
    /// notifications sent in between are lost.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::Database` if the connection was lost.
    pub async fn recv(&mut self) -> Result<(), OutboxError> {
        self.listener.recv().await.map(|_| ()).map_err(db_error)
    }
}
