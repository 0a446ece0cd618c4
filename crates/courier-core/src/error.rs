//! Error types shared across the outbox pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Failure reported by a transport client.
///
/// The dispatcher recovers from every variant locally; none of them reach the
/// business request that recorded the event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProducerError {
    /// `publish` was called before `start`.
    #[error("producer is not started")]
    NotStarted,

    /// `start` was called on a producer that is already connected.
    #[error("producer is already started")]
    AlreadyStarted,

    /// The broker connection could not be established.
    #[error("broker connection failed: {0}")]
    Connection(String),

    /// The payload could not be encoded.
    #[error("payload serialization failed: {0}")]
    Serialization(String),

    /// The broker did not acknowledge the message within the retry budget.
    #[error("broker did not acknowledge publish to {topic} after {attempts} attempt(s): {reason}")]
    Unacknowledged {
        /// Destination topic.
        topic: String,
        /// Attempts made before giving up.
        attempts: u32,
        /// Last failure reported by the broker client.
        reason: String,
    },
}

impl ProducerError {
    /// Stable label for this error, written into dead-letter envelopes.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::AlreadyStarted => "already_started",
            Self::Connection(_) => "connection",
            Self::Serialization(_) => "serialization",
            Self::Unacknowledged { .. } => "unacknowledged",
        }
    }
}

/// Failure of the durable outbox store.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// Database or connection error.
    #[error("outbox database error: {0}")]
    Database(String),

    /// Stored payload could not be (de)serialized.
    #[error("outbox serialization error: {0}")]
    Serialization(String),

    /// A row carried a status value this version does not know.
    #[error("unknown outbox status: {0}")]
    InvalidStatus(String),
}

/// Error returned by business services that write outbox rows.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The entity does not exist.
    #[error("entity not found: {0}")]
    NotFound(Uuid),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl From<OutboxError> for DomainError {
    fn from(err: OutboxError) -> Self {
        Self::Infrastructure(err.to_string())
    }
}
