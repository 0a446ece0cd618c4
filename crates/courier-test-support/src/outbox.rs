//! In-memory outbox: mock `OutboxRepository` implementations for tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_core::error::OutboxError;
use courier_core::outbox::{
    FailureOutcome, MarkOutcome, NewOutboxMessage, OutboxMessage, OutboxStatus,
};
use courier_core::repository::OutboxRepository;
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    rows: Vec<OutboxMessage>,
    mark_sent_calls: Vec<Uuid>,
    failing_marks: HashSet<Uuid>,
    failing_records: HashSet<Uuid>,
}

/// An outbox kept in memory. Rows become visible only through a committed
/// [`InMemoryUnitOfWork`], mirroring how a business transaction behaves.
///
/// Clones share the same storage, so a test can hand one clone to the
/// dispatcher and inspect another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOutbox {
    state: Arc<Mutex<State>>,
}

impl InMemoryOutbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a unit of work. Rows added to it are visible only after
    /// [`InMemoryUnitOfWork::commit`]; dropping it discards them.
    #[must_use]
    pub fn begin(&self) -> InMemoryUnitOfWork {
        InMemoryUnitOfWork {
            outbox: self.clone(),
            staged: Vec::new(),
        }
    }

    /// Adds and commits a single row. Returns its id.
    pub fn insert_committed(&self, message: NewOutboxMessage) -> Uuid {
        let id = message.id;
        let mut uow = self.begin();
        uow.add(message);
        uow.commit();
        id
    }

    /// Snapshot of every committed row, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn messages(&self) -> Vec<OutboxMessage> {
        self.state.lock().unwrap().rows.clone()
    }

    /// Status of one row, if present.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn status_of(&self, id: Uuid) -> Option<OutboxStatus> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.status)
    }

    /// Every id passed to `mark_sent`, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn mark_sent_calls(&self) -> Vec<Uuid> {
        self.state.lock().unwrap().mark_sent_calls.clone()
    }

    /// Makes `mark_sent` fail for `id`, simulating a crash between the
    /// broker acknowledgment and the status update.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_mark_sent_for(&self, id: Uuid) {
        self.state.lock().unwrap().failing_marks.insert(id);
    }

    /// Undoes [`Self::fail_mark_sent_for`].
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn heal_mark_sent_for(&self, id: Uuid) {
        self.state.lock().unwrap().failing_marks.remove(&id);
    }

    /// Makes `record_failure` fail for `id`, leaving the row untouched.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_record_failure_for(&self, id: Uuid) {
        self.state.lock().unwrap().failing_records.insert(id);
    }
}

/// Pending rows staged inside one simulated business transaction.
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    outbox: InMemoryOutbox,
    staged: Vec<OutboxMessage>,
}

impl InMemoryUnitOfWork {
    /// Stages a pending row.
    pub fn add(&mut self, message: NewOutboxMessage) {
        self.staged.push(message.into_pending());
    }

    /// Makes every staged row visible.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn commit(self) {
        let mut state = self.outbox.state.lock().unwrap();
        state.rows.extend(self.staged);
    }

    /// Discards every staged row.
    pub fn rollback(self) {}
}

#[async_trait]
impl OutboxRepository for InMemoryOutbox {
    async fn get_pending(&self, limit: usize) -> Result<Vec<OutboxMessage>, OutboxError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|m| m.status == OutboxStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_pending_after(
        &self,
        after: Uuid,
        limit: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxError> {
        let state = self.state.lock().unwrap();
        let Some(position) = state.rows.iter().position(|m| m.id == after) else {
            return Ok(Vec::new());
        };
        Ok(state.rows[position + 1..]
            .iter()
            .filter(|m| m.status == OutboxStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, id: Uuid) -> Result<MarkOutcome, OutboxError> {
        let mut state = self.state.lock().unwrap();
        state.mark_sent_calls.push(id);
        if state.failing_marks.contains(&id) {
            return Err(OutboxError::Database("connection reset".into()));
        }

        match state
            .rows
            .iter_mut()
            .find(|m| m.id == id && m.status == OutboxStatus::Pending)
        {
            Some(row) => {
                row.status = OutboxStatus::Sent;
                row.sent_at = Some(row.created_at);
                Ok(MarkOutcome::Marked)
            }
            None => Ok(MarkOutcome::NoMatch),
        }
    }

    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        max_attempts: Option<u32>,
    ) -> Result<FailureOutcome, OutboxError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_records.contains(&id) {
            return Err(OutboxError::Database("connection reset".into()));
        }
        let Some(row) = state
            .rows
            .iter_mut()
            .find(|m| m.id == id && m.status == OutboxStatus::Pending)
        else {
            return Ok(FailureOutcome::NoMatch);
        };

        row.attempts += 1;
        row.last_error = Some(error.to_owned());
        let limit_reached = max_attempts
            .is_some_and(|max| i64::from(row.attempts) >= i64::from(max));
        if limit_reached {
            row.status = OutboxStatus::Dead;
            Ok(FailureOutcome::Dead {
                attempts: row.attempts,
            })
        } else {
            Ok(FailureOutcome::Retrying {
                attempts: row.attempts,
            })
        }
    }

    async fn pending_count(&self) -> Result<i64, OutboxError> {
        let count = self
            .state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|m| m.status == OutboxStatus::Pending)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

/// An outbox repository that always returns a database error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingOutboxRepository;

#[async_trait]
impl OutboxRepository for FailingOutboxRepository {
    async fn get_pending(&self, _limit: usize) -> Result<Vec<OutboxMessage>, OutboxError> {
        Err(OutboxError::Database("connection refused".into()))
    }

    async fn get_pending_after(
        &self,
        _after: Uuid,
        _limit: usize,
    ) -> Result<Vec<OutboxMessage>, OutboxError> {
        Err(OutboxError::Database("connection refused".into()))
    }

    async fn mark_sent(&self, _id: Uuid) -> Result<MarkOutcome, OutboxError> {
        Err(OutboxError::Database("connection refused".into()))
    }

    async fn record_failure(
        &self,
        _id: Uuid,
        _error: &str,
        _max_attempts: Option<u32>,
    ) -> Result<FailureOutcome, OutboxError> {
        Err(OutboxError::Database("connection refused".into()))
    }

    async fn pending_count(&self) -> Result<i64, OutboxError> {
        Err(OutboxError::Database("connection refused".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedClock;

    fn message(n: i64) -> NewOutboxMessage {
        NewOutboxMessage::new(
            "users.created",
            serde_json::json!({ "n": n }),
            &FixedClock::default(),
        )
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_discards_rows() {
        let outbox = InMemoryOutbox::new();

        {
            let mut uow = outbox.begin();
            uow.add(message(1));
        }

        assert!(outbox.get_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_committed_rows_are_pending_in_order() {
        let outbox = InMemoryOutbox::new();
        let mut uow = outbox.begin();
        let first = message(1);
        let second = message(2);
        let ids = [first.id, second.id];
        uow.add(first);
        uow.add(second);
        uow.commit();

        let pending = outbox.get_pending(10).await.unwrap();

        assert_eq!(pending.iter().map(|m| m.id).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn test_get_pending_after_skips_earlier_and_settled_rows() {
        let outbox = InMemoryOutbox::new();
        let first = outbox.insert_committed(message(1));
        let second = outbox.insert_committed(message(2));
        let third = outbox.insert_committed(message(3));
        let fourth = outbox.insert_committed(message(4));
        outbox.mark_sent(third).await.unwrap();

        let pending = outbox.get_pending_after(first, 10).await.unwrap();

        assert_eq!(
            pending.iter().map(|m| m.id).collect::<Vec<_>>(),
            [second, fourth]
        );
        assert!(outbox.get_pending_after(fourth, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_marks_dead_at_limit() {
        let outbox = InMemoryOutbox::new();
        let id = outbox.insert_committed(message(1));

        let first = outbox.record_failure(id, "boom", Some(2)).await.unwrap();
        let second = outbox.record_failure(id, "boom", Some(2)).await.unwrap();

        assert_eq!(first, FailureOutcome::Retrying { attempts: 1 });
        assert_eq!(second, FailureOutcome::Dead { attempts: 2 });
        assert_eq!(outbox.status_of(id), Some(OutboxStatus::Dead));
    }
}
