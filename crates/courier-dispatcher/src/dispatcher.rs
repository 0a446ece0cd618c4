//! The dispatch cycle and its polling loop.

use std::sync::Arc;

use courier_core::error::ProducerError;
use courier_core::outbox::{DeadLetterEnvelope, FailureOutcome, MarkOutcome, OutboxMessage};
use courier_core::repository::OutboxRepository;
use courier_core::transport::TransportClient;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::report::DispatchReport;
use crate::trigger::DispatchTrigger;

/// Publishes pending outbox rows and records the outcome of each.
///
/// A single dispatcher works through its batch sequentially, so a row is
/// marked `SENT` only after its own acknowledgment and rows sharing a key
/// leave in insertion order.
///
/// After a full batch the next cycle resumes behind the last row it
/// attempted, wrapping to the oldest pending row once it reaches the end.
/// Rows that keep failing therefore never hide newer rows from the fetch.
pub struct Dispatcher {
    repository: Arc<dyn OutboxRepository>,
    transport: Arc<dyn TransportClient>,
    config: DispatcherConfig,
    trigger: DispatchTrigger,
    resume_after: Mutex<Option<Uuid>>,
}

impl Dispatcher {
    /// Creates a dispatcher over `repository` and a started `transport`.
    #[must_use]
    pub fn new(
        repository: Arc<dyn OutboxRepository>,
        transport: Arc<dyn TransportClient>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            repository,
            transport,
            config,
            trigger: DispatchTrigger::new(),
            resume_after: Mutex::new(None),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Handle that wakes [`Self::run`] ahead of its next poll.
    #[must_use]
    pub fn trigger(&self) -> DispatchTrigger {
        self.trigger.clone()
    }

    /// Runs one cycle over up to `batch_size` pending rows, starting behind
    /// the last row of the previous full batch.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Store` if pending rows cannot be fetched.
    /// Failures of individual rows are counted in the report instead.
    pub async fn dispatch_once(&self) -> Result<DispatchReport, DispatchError> {
        self.cycle(&CancellationToken::new()).await
    }

    /// Runs cycles until `shutdown` is cancelled.
    ///
    /// A cycle starts every `poll_interval`, when the trigger fires, or right
    /// away after a full batch that made progress. Cancellation lets the row
    /// in flight finish.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = u64::try_from(self.config.poll_interval.as_millis()).unwrap_or(u64::MAX),
            max_attempts = ?self.config.max_attempts,
            dead_letter_topic = ?self.config.dead_letter_topic,
            "dispatcher started"
        );

        while !shutdown.is_cancelled() {
            match self.cycle(&shutdown).await {
                Ok(report) if report.is_full_batch(self.config.batch_size) && report.settled() > 0 => {
                    continue;
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "dispatch cycle failed"),
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = self.trigger.notified() => debug!("dispatch triggered"),
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("dispatcher stopped");
    }

    #[instrument(skip(self, shutdown), fields(batch_size = self.config.batch_size))]
    async fn cycle(&self, shutdown: &CancellationToken) -> Result<DispatchReport, DispatchError> {
        let started = Instant::now();
        let mut resume_after = self.resume_after.lock().await;
        let batch = self.fetch(resume_after.take()).await?;
        let mut report = DispatchReport {
            fetched: batch.len(),
            ..DispatchReport::default()
        };

        for (index, message) in batch.iter().enumerate() {
            if index > 0 {
                let out_of_time = started.elapsed() >= self.config.cycle_deadline;
                if out_of_time || shutdown.is_cancelled() {
                    report.deferred = batch.len() - index;
                    warn!(
                        deferred = report.deferred,
                        out_of_time,
                        "cycle interrupted, remaining rows deferred"
                    );
                    break;
                }
            }
            self.dispatch_message(message, &mut report).await;
            *resume_after = Some(message.id);
        }

        if !report.is_full_batch(self.config.batch_size) && report.deferred == 0 {
            *resume_after = None;
        }

        if report.fetched > 0 {
            info!(
                fetched = report.fetched,
                sent = report.sent,
                failed = report.failed,
                dead = report.dead,
                dead_lettered = report.dead_lettered,
                dead_letter_failures = report.dead_letter_failures,
                mark_failures = report.mark_failures,
                record_failures = report.record_failures,
                deferred = report.deferred,
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "dispatch cycle complete"
            );
        } else {
            debug!("no pending outbox rows");
        }

        Ok(report)
    }

    async fn fetch(&self, after: Option<Uuid>) -> Result<Vec<OutboxMessage>, DispatchError> {
        let limit = self.config.batch_size;
        if let Some(after) = after {
            let batch = self.repository.get_pending_after(after, limit).await?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            debug!("reached the end of the pending rows, wrapping around");
        }
        Ok(self.repository.get_pending(limit).await?)
    }

    async fn dispatch_message(&self, message: &OutboxMessage, report: &mut DispatchReport) {
        let key = message.key();
        match self
            .transport
            .publish(&message.topic, &message.payload, Some(&key))
            .await
        {
            Ok(()) => {
                report.sent += 1;
                self.mark_sent(message, report).await;
            }
            Err(error) => {
                report.failed += 1;
                self.handle_failure(message, &error, report).await;
            }
        }
    }

    async fn mark_sent(&self, message: &OutboxMessage, report: &mut DispatchReport) {
        match self.repository.mark_sent(message.id).await {
            Ok(MarkOutcome::Marked) => {
                debug!(outbox_id = %message.id, topic = %message.topic, "outbox row sent");
            }
            Ok(MarkOutcome::NoMatch) => {
                debug!(outbox_id = %message.id, "outbox row already settled");
            }
            Err(e) => {
                report.mark_failures += 1;
                error!(
                    outbox_id = %message.id,
                    topic = %message.topic,
                    error = %e,
                    "published but could not mark sent; row will be redelivered"
                );
            }
        }
    }

    async fn handle_failure(
        &self,
        message: &OutboxMessage,
        error: &ProducerError,
        report: &mut DispatchReport,
    ) {
        let outcome = match self
            .repository
            .record_failure(message.id, &error.to_string(), self.config.max_attempts)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                report.record_failures += 1;
                error!(
                    outbox_id = %message.id,
                    topic = %message.topic,
                    error = %e,
                    publish_error = %error,
                    "could not record publish failure"
                );
                return;
            }
        };

        let dead_letter_revision = match outcome {
            FailureOutcome::Retrying { attempts } => {
                warn!(
                    outbox_id = %message.id,
                    topic = %message.topic,
                    attempts,
                    error = %error,
                    "publish failed, will retry"
                );
                self.config.max_attempts.is_none().then_some(attempts)
            }
            FailureOutcome::Dead { attempts } => {
                report.dead += 1;
                error!(
                    outbox_id = %message.id,
                    topic = %message.topic,
                    attempts,
                    error = %error,
                    "publish attempts exhausted, row is dead"
                );
                Some(attempts)
            }
            FailureOutcome::NoMatch => {
                debug!(outbox_id = %message.id, "failed row was settled concurrently");
                None
            }
        };

        if let Some(attempts) = dead_letter_revision {
            self.dead_letter(message, error, attempts, report).await;
        }
    }

    /// Publishes the envelope for one failed attempt. The attempt count is
    /// the revision, so each failure of an unbounded row is kept by the
    /// broker rather than collapsed into the first.
    async fn dead_letter(
        &self,
        message: &OutboxMessage,
        error: &ProducerError,
        attempts: i32,
        report: &mut DispatchReport,
    ) {
        let Some(topic) = self.config.dead_letter_topic.as_deref() else {
            return;
        };

        let envelope = DeadLetterEnvelope::new(message, error);
        match self
            .transport
            .publish_revision(topic, &envelope.to_payload(), &message.key(), attempts)
            .await
        {
            Ok(()) => {
                report.dead_lettered += 1;
                info!(
                    outbox_id = %message.id,
                    dead_letter_topic = topic,
                    attempts,
                    error_type = %envelope.error_type,
                    "dead-letter envelope published"
                );
            }
            Err(e) => {
                report.dead_letter_failures += 1;
                error!(
                    outbox_id = %message.id,
                    dead_letter_topic = topic,
                    error = %e,
                    "dead-letter publish failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use courier_core::outbox::{NewOutboxMessage, OutboxStatus};
    use courier_test_support::{FailingOutboxRepository, FixedClock, InMemoryOutbox, RecordingTransport};
    use serde_json::json;

    use super::*;
    use crate::config::DEFAULT_DEAD_LETTER_TOPIC;

    const TOPIC: &str = "users.created";

    fn dispatcher(
        outbox: &InMemoryOutbox,
        transport: &Arc<RecordingTransport>,
        config: DispatcherConfig,
    ) -> Dispatcher {
        Dispatcher::new(Arc::new(outbox.clone()), transport.clone(), config)
    }

    fn commit(outbox: &InMemoryOutbox, payload: serde_json::Value) -> uuid::Uuid {
        outbox.insert_committed(NewOutboxMessage::new(TOPIC, payload, &FixedClock::default()))
    }

    #[tokio::test]
    async fn test_dispatch_once_with_empty_outbox_does_nothing() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = dispatcher(&outbox, &transport, DispatcherConfig::default());

        // Act
        let report = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(report, DispatchReport::default());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_once_publishes_in_insertion_order_keyed_by_id() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let ids: Vec<_> = (1..=3).map(|n| commit(&outbox, json!({ "n": n }))).collect();
        let dispatcher = dispatcher(&outbox, &transport, DispatcherConfig::default());

        // Act
        let report = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(report.fetched, 3);
        assert_eq!(report.sent, 3);
        let published = transport.published_to(TOPIC);
        let keys: Vec<_> = published.iter().map(|m| m.key.clone()).collect();
        let expected: Vec<_> = ids.iter().map(|id| Some(id.to_string())).collect();
        assert_eq!(keys, expected);
        assert_eq!(published[0].payload, json!({ "n": 1 }));
        for id in ids {
            assert_eq!(outbox.status_of(id), Some(OutboxStatus::Sent));
        }
    }

    #[tokio::test]
    async fn test_failed_row_does_not_block_the_rest_of_the_batch() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let first = commit(&outbox, json!({ "n": 1 }));
        let second = commit(&outbox, json!({ "n": 2 }));
        let third = commit(&outbox, json!({ "n": 3 }));
        transport.fail_call(1);
        let dispatcher = dispatcher(&outbox, &transport, DispatcherConfig::default());

        // Act
        let report = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.dead, 0);
        assert_eq!(outbox.status_of(first), Some(OutboxStatus::Sent));
        assert_eq!(outbox.status_of(second), Some(OutboxStatus::Pending));
        assert_eq!(outbox.status_of(third), Some(OutboxStatus::Sent));
        let failed = outbox.messages().into_iter().find(|m| m.id == second).unwrap();
        assert_eq!(failed.attempts, 1);
        assert!(failed.last_error.unwrap().contains("scripted failure"));
    }

    #[tokio::test]
    async fn test_row_failing_once_is_sent_on_next_cycle_with_same_key() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let id = commit(&outbox, json!({ "n": 1 }));
        transport.fail_key(&id.to_string(), 1);
        let dispatcher = dispatcher(&outbox, &transport, DispatcherConfig::default());

        // Act
        let first = dispatcher.dispatch_once().await.unwrap();
        let second = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(first.failed, 1);
        assert_eq!(second.sent, 1);
        assert_eq!(outbox.status_of(id), Some(OutboxStatus::Sent));
        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].key, calls[1].key);
        assert!(transport.published_to(DEFAULT_DEAD_LETTER_TOPIC).is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_row_becomes_dead_and_is_dead_lettered_once() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let id = commit(&outbox, json!({ "user_id": "42" }));
        transport.fail_topic(TOPIC);
        let config = DispatcherConfig {
            max_attempts: Some(3),
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        let mut reports = Vec::new();
        for _ in 0..4 {
            reports.push(dispatcher.dispatch_once().await.unwrap());
        }

        // Assert
        assert_eq!(reports[0].dead, 0);
        assert_eq!(reports[1].dead, 0);
        assert_eq!(reports[2].dead, 1);
        assert_eq!(reports[2].dead_lettered, 1);
        assert_eq!(reports[3].fetched, 0);
        assert_eq!(outbox.status_of(id), Some(OutboxStatus::Dead));
        assert_eq!(transport.published_to(DEFAULT_DEAD_LETTER_TOPIC).len(), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_envelope_wraps_original_payload_keyed_by_id() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let payload = json!({ "user_id": "42", "name": "Ada", "tags": [1, 2] });
        let id = commit(&outbox, payload.clone());
        transport.fail_topic(TOPIC);
        let config = DispatcherConfig {
            max_attempts: Some(1),
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        dispatcher.dispatch_once().await.unwrap();

        // Assert
        let envelopes = transport.published_to(DEFAULT_DEAD_LETTER_TOPIC);
        assert_eq!(envelopes.len(), 1);
        let envelope = &envelopes[0];
        assert_eq!(envelope.key, Some(id.to_string()));
        assert_eq!(envelope.payload["original"], payload);
        assert_eq!(envelope.payload["error_type"], "unacknowledged");
        assert!(
            envelope.payload["error"]
                .as_str()
                .unwrap()
                .contains("scripted failure")
        );
    }

    #[tokio::test]
    async fn test_unbounded_retry_dead_letters_every_failure() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let id = commit(&outbox, json!({ "n": 1 }));
        transport.fail_topic(TOPIC);
        let config = DispatcherConfig {
            max_attempts: None,
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        dispatcher.dispatch_once().await.unwrap();
        dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(outbox.status_of(id), Some(OutboxStatus::Pending));
        let envelopes = transport.published_to(DEFAULT_DEAD_LETTER_TOPIC);
        let revisions: Vec<_> = envelopes.iter().map(|m| m.revision).collect();
        assert_eq!(revisions, [Some(1), Some(2)]);
        assert!(envelopes.iter().all(|m| m.key == Some(id.to_string())));
    }

    #[tokio::test]
    async fn test_dead_letter_failure_is_isolated_to_its_row() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let first = commit(&outbox, json!({ "n": 1 }));
        let second = commit(&outbox, json!({ "n": 2 }));
        transport.fail_topic(TOPIC);
        transport.fail_topic(DEFAULT_DEAD_LETTER_TOPIC);
        let config = DispatcherConfig {
            max_attempts: Some(1),
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        let report = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(report.fetched, 2);
        assert_eq!(report.dead, 2);
        assert_eq!(report.dead_letter_failures, 2);
        assert_eq!(report.dead_lettered, 0);
        assert_eq!(outbox.status_of(first), Some(OutboxStatus::Dead));
        assert_eq!(outbox.status_of(second), Some(OutboxStatus::Dead));
    }

    #[tokio::test]
    async fn test_without_dead_letter_topic_no_envelope_is_published() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let id = commit(&outbox, json!({ "n": 1 }));
        transport.fail_topic(TOPIC);
        let config = DispatcherConfig {
            max_attempts: Some(1),
            dead_letter_topic: None,
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        let report = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(report.dead, 1);
        assert_eq!(report.dead_lettered, 0);
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(outbox.status_of(id), Some(OutboxStatus::Dead));
    }

    #[tokio::test]
    async fn test_crash_between_publish_and_mark_redelivers() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let id = commit(&outbox, json!({ "n": 1 }));
        outbox.fail_mark_sent_for(id);
        let dispatcher = dispatcher(&outbox, &transport, DispatcherConfig::default());

        // Act
        let first = dispatcher.dispatch_once().await.unwrap();
        outbox.heal_mark_sent_for(id);
        let second = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(first.sent, 1);
        assert_eq!(first.mark_failures, 1);
        assert_eq!(second.sent, 1);
        assert_eq!(second.mark_failures, 0);
        let published = transport.published_to(TOPIC);
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].key, Some(id.to_string()));
        assert_eq!(published[1].key, Some(id.to_string()));
        assert_eq!(outbox.status_of(id), Some(OutboxStatus::Sent));
    }

    #[tokio::test]
    async fn test_elapsed_deadline_defers_remaining_rows() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let ids: Vec<_> = (1..=3).map(|n| commit(&outbox, json!({ "n": n }))).collect();
        let config = DispatcherConfig {
            cycle_deadline: Duration::ZERO,
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        let report = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(report.sent, 1);
        assert_eq!(report.deferred, 2);
        assert_eq!(outbox.status_of(ids[0]), Some(OutboxStatus::Sent));
        assert_eq!(outbox.status_of(ids[1]), Some(OutboxStatus::Pending));
        assert_eq!(outbox.status_of(ids[2]), Some(OutboxStatus::Pending));
    }

    #[tokio::test]
    async fn test_batch_size_limits_rows_per_cycle() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        for n in 0..5 {
            commit(&outbox, json!({ "n": n }));
        }
        let config = DispatcherConfig {
            batch_size: 2,
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        let report = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(report.fetched, 2);
        assert!(report.is_full_batch(2));
        assert_eq!(transport.published().len(), 2);
    }

    #[tokio::test]
    async fn test_rows_failing_forever_do_not_starve_newer_rows() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let clock = FixedClock::default();
        let stuck: Vec<_> = (1..=2)
            .map(|n| {
                outbox.insert_committed(NewOutboxMessage::new("broken", json!({ "n": n }), &clock))
            })
            .collect();
        let fresh = commit(&outbox, json!({ "n": 3 }));
        transport.fail_topic("broken");
        let config = DispatcherConfig {
            batch_size: 2,
            max_attempts: None,
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        let first = dispatcher.dispatch_once().await.unwrap();
        let second = dispatcher.dispatch_once().await.unwrap();
        let third = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(first.failed, 2);
        assert_eq!(second.sent, 1);
        assert_eq!(outbox.status_of(fresh), Some(OutboxStatus::Sent));
        assert_eq!(transport.published_to(TOPIC).len(), 1);
        assert_eq!(third.failed, 2);
        for id in stuck {
            assert_eq!(outbox.status_of(id), Some(OutboxStatus::Pending));
        }
    }

    #[tokio::test]
    async fn test_full_batch_resumes_behind_its_last_row() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let ids: Vec<_> = (1..=3).map(|n| commit(&outbox, json!({ "n": n }))).collect();
        transport.fail_call(0);
        let config = DispatcherConfig {
            batch_size: 2,
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        dispatcher.dispatch_once().await.unwrap();
        let second = dispatcher.dispatch_once().await.unwrap();
        let third = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(second.fetched, 1);
        assert_eq!(outbox.status_of(ids[2]), Some(OutboxStatus::Sent));
        assert_eq!(third.sent, 1);
        assert_eq!(outbox.status_of(ids[0]), Some(OutboxStatus::Sent));
    }

    #[tokio::test]
    async fn test_unrecorded_failure_leaves_row_pending_without_dead_letter() {
        // Arrange
        let outbox = InMemoryOutbox::new();
        let transport = Arc::new(RecordingTransport::new());
        let first = commit(&outbox, json!({ "n": 1 }));
        let second = commit(&outbox, json!({ "n": 2 }));
        transport.fail_key(&first.to_string(), 1);
        outbox.fail_record_failure_for(first);
        let config = DispatcherConfig {
            max_attempts: None,
            ..DispatcherConfig::default()
        };
        let dispatcher = dispatcher(&outbox, &transport, config);

        // Act
        let report = dispatcher.dispatch_once().await.unwrap();

        // Assert
        assert_eq!(report.failed, 1);
        assert_eq!(report.record_failures, 1);
        assert_eq!(report.sent, 1);
        assert!(transport.published_to(DEFAULT_DEAD_LETTER_TOPIC).is_empty());
        let row = outbox.messages().into_iter().find(|m| m.id == first).unwrap();
        assert_eq!(row.status, OutboxStatus::Pending);
        assert_eq!(row.attempts, 0);
        assert_eq!(outbox.status_of(second), Some(OutboxStatus::Sent));
    }

    #[tokio::test]
    async fn test_store_error_on_fetch_aborts_cycle() {
        // Arrange
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = Dispatcher::new(
            Arc::new(FailingOutboxRepository),
            transport.clone(),
            DispatcherConfig::default(),
        );

        // Act
        let result = dispatcher.dispatch_once().await;

        // Assert
        assert!(matches!(result, Err(DispatchError::Store(_))));
        assert!(transport.calls().is_empty());
    }
}
