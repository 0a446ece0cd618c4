//! Message transport abstraction.

use async_trait::async_trait;

use crate::error::ProducerError;

/// Client that delivers serialized events to the message broker.
///
/// Implementations own the broker connection exclusively. `publish` returns
/// only once the broker acknowledged the message on all replicas, and must
/// bound its own wait with an internal retry/ack-timeout budget.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Establishes the broker connection.
    ///
    /// # Errors
    ///
    /// Returns `ProducerError::AlreadyStarted` if the client is already
    /// connected, or `ProducerError::Connection` if the broker is unreachable.
    async fn start(&self) -> Result<(), ProducerError>;

    /// Releases the broker connection. A no-op if never started.
    async fn stop(&self);

    /// Publishes `payload` as UTF-8 JSON to `topic`.
    ///
    /// When `key` is present, every message with that key lands in the same
    /// ordering lane and a retried publish of the same key is not committed
    /// twice by the broker.
    ///
    /// # Errors
    ///
    /// Returns `ProducerError::NotStarted` before `start`, or
    /// `ProducerError::Unacknowledged` once the retry budget is spent.
    async fn publish(
        &self,
        topic: &str,
        payload: &serde_json::Value,
        key: Option<&str>,
    ) -> Result<(), ProducerError>;

    /// Publishes one revision of a keyed message.
    ///
    /// Retries of the same `(key, revision)` are still collapsed by the
    /// broker, but a new `revision` is kept as a message of its own. The
    /// default forwards to [`Self::publish`] for transports without
    /// deduplication.
    ///
    /// # Errors
    ///
    /// Same as [`Self::publish`].
    async fn publish_revision(
        &self,
        topic: &str,
        payload: &serde_json::Value,
        key: &str,
        revision: i32,
    ) -> Result<(), ProducerError> {
        let _ = revision;
        self.publish(topic, payload, Some(key)).await
    }
}
