//! The outbox record and its lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{OutboxError, ProducerError};
use crate::event::DomainEvent;

/// Delivery status of an outbox row.
///
/// `Pending` is the only non-terminal state. A row moves to `Sent` once the
/// broker acknowledged it, or to `Dead` once its retry budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    /// Recorded, not yet acknowledged by the broker.
    Pending,
    /// Acknowledged by the broker.
    Sent,
    /// Gave up after the configured number of failed attempts.
    Dead,
}

impl OutboxStatus {
    /// Column value used by the relational store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Dead => "DEAD",
        }
    }

    /// Returns `true` for `Sent` and `Dead`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "SENT" => Ok(Self::Sent),
            "DEAD" => Ok(Self::Dead),
            other => Err(OutboxError::InvalidStatus(other.to_owned())),
        }
    }
}

/// A stored outbox row as read by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    /// Unique, immutable identifier. Also the broker message key.
    pub id: Uuid,
    /// Destination topic.
    pub topic: String,
    /// Serialized domain event. Never mutated after insertion.
    pub payload: serde_json::Value,
    /// Delivery status.
    pub status: OutboxStatus,
    /// Failed publish attempts so far.
    pub attempts: i32,
    /// Error message of the latest failed attempt.
    pub last_error: Option<String>,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Time the broker acknowledged the message.
    pub sent_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// The key used when publishing this row.
    #[must_use]
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}

/// An outbox row about to be written inside a business transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxMessage {
    /// Identifier assigned at creation.
    pub id: Uuid,
    /// Destination topic.
    pub topic: String,
    /// Serialized domain event.
    pub payload: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl NewOutboxMessage {
    /// Creates a new pending entry for `topic` with a fresh id.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: serde_json::Value, clock: &dyn Clock) -> Self {
        Self {
            id: Uuid::now_v7(),
            topic: topic.into(),
            payload,
            created_at: clock.now(),
        }
    }

    /// Creates a new pending entry carrying `event`'s payload.
    #[must_use]
    pub fn from_event(topic: impl Into<String>, event: &dyn DomainEvent, clock: &dyn Clock) -> Self {
        Self::new(topic, event.to_payload(), clock)
    }

    /// The stored form of this entry, before any delivery attempt.
    #[must_use]
    pub fn into_pending(self) -> OutboxMessage {
        OutboxMessage {
            id: self.id,
            topic: self.topic,
            payload: self.payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: self.created_at,
            sent_at: None,
        }
    }
}

/// Result of `mark_sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The row moved from `Pending` to `Sent`.
    Marked,
    /// No pending row with that id: already sent, dead, or missing.
    NoMatch,
}

/// Result of `record_failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The row stays pending and will be retried next cycle.
    Retrying {
        /// Failed attempts including this one.
        attempts: i32,
    },
    /// The row reached its attempt limit and is now `Dead`.
    Dead {
        /// Failed attempts including this one.
        attempts: i32,
    },
    /// No pending row with that id.
    NoMatch,
}

/// Message published to the dead-letter topic when a row cannot be delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEnvelope {
    /// Stable label of the producer error.
    pub error_type: String,
    /// Human-readable error message.
    pub error: String,
    /// The undelivered payload, unmodified.
    pub original: serde_json::Value,
}

impl DeadLetterEnvelope {
    /// Builds the envelope for `message` failing with `error`.
    #[must_use]
    pub fn new(message: &OutboxMessage, error: &ProducerError) -> Self {
        Self {
            error_type: error.error_type().to_owned(),
            error: error.to_string(),
            original: message.payload.clone(),
        }
    }

    /// JSON form of the envelope.
    #[must_use]
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error_type": self.error_type,
            "error": self.error,
            "original": self.original,
        })
    }
}
