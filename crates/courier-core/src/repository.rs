//! Outbox repository abstraction.
//!
//! This is the dispatcher's view of the store. Inserting rows is not part of
//! the trait: an insert must share the caller's business transaction, so each
//! store offers it in terms of its own transaction type.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::OutboxError;
use crate::outbox::{FailureOutcome, MarkOutcome, OutboxMessage};

/// Repository trait for reading and transitioning outbox rows.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Returns up to `limit` pending rows in insertion order.
    async fn get_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>, OutboxError>;

    /// Returns up to `limit` pending rows inserted after the row `after`, in
    /// insertion order. Lets a caller page past rows that keep failing.
    async fn get_pending_after(
        &self,
        after: Uuid,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxError>;

    /// Transitions one row from `Pending` to `Sent`.
    ///
    /// Must only be called after the transport acknowledged the publish.
    /// Rows that are already sent, dead, or missing yield
    /// [`MarkOutcome::NoMatch`] rather than an error.
    async fn mark_sent(&self, id: Uuid) -> Result<MarkOutcome, OutboxError>;

    /// Records a failed publish attempt for a pending row.
    ///
    /// With `max_attempts = Some(n)` the row becomes `Dead` once it has failed
    /// `n` times. `None` keeps it pending forever.
    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        max_attempts: Option<u32>,
    ) -> Result<FailureOutcome, OutboxError>;

    /// Number of rows still pending.
    async fn pending_count(&self) -> Result<i64, OutboxError>;
}
