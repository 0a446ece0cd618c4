//! Transport configuration.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::backoff::Backoff;

/// Invalid transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportConfigError {
    /// Only acknowledgment from all replicas is supported.
    #[error("unsupported acknowledgment mode {0:?}: only \"all\" is supported")]
    UnsupportedAcks(String),

    /// Duplicate suppression cannot be turned off.
    #[error("idempotent producer cannot be disabled")]
    IdempotenceRequired,
}

/// Broker acknowledgment mode.
///
/// `JetStream` acknowledges a publish once the stream stored it on its
/// replicas, which is the only mode the outbox relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Acknowledged by every replica of the stream.
    #[default]
    All,
}

impl FromStr for AckMode {
    type Err = TransportConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "-1" => Ok(Self::All),
            _ => Err(TransportConfigError::UnsupportedAcks(s.to_owned())),
        }
    }
}

/// Stream the transport provisions on start.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// Stream name.
    pub name: String,
    /// Subjects captured by the stream (topics plus the dead-letter topic).
    pub subjects: Vec<String>,
    /// Replica count; an acknowledgment covers all of them.
    pub replicas: usize,
    /// Window within which a repeated `Nats-Msg-Id` is dropped.
    pub duplicate_window: Duration,
}

/// Configuration for [`crate::NatsTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Broker bootstrap address(es), comma separated.
    pub servers: String,
    /// Connection name reported to the broker.
    pub client_name: String,
    /// Bound on establishing the connection.
    pub connection_timeout: Duration,
    /// Bound on waiting for one publish acknowledgment.
    pub ack_timeout: Duration,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay between attempts.
    pub backoff: Backoff,
    /// Stream to create or reuse on start. `None` expects it to exist.
    pub stream: Option<StreamSettings>,
    ack_mode: AckMode,
    idempotent: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            servers: "nats://localhost:4222".to_owned(),
            client_name: "courier-relay".to_owned(),
            connection_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(5),
            max_retries: 3,
            backoff: Backoff::default(),
            stream: None,
            ack_mode: AckMode::All,
            idempotent: true,
        }
    }
}

impl TransportConfig {
    /// Creates a configuration for `servers` with defaults elsewhere.
    #[must_use]
    pub fn new(servers: impl Into<String>) -> Self {
        Self {
            servers: servers.into(),
            ..Self::default()
        }
    }

    /// Acknowledgment mode; always [`AckMode::All`].
    #[must_use]
    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    /// Whether duplicate suppression is on; always `true`.
    #[must_use]
    pub fn idempotent(&self) -> bool {
        self.idempotent
    }

    /// Applies externally supplied durability settings.
    ///
    /// # Errors
    ///
    /// Returns `TransportConfigError` unless `acks` is `"all"` and
    /// `idempotent` is `true`.
    pub fn with_durability(mut self, acks: &str, idempotent: bool) -> Result<Self, TransportConfigError> {
        self.ack_mode = acks.parse()?;
        if !idempotent {
            return Err(TransportConfigError::IdempotenceRequired);
        }
        self.idempotent = true;
        Ok(self)
    }

    /// Total attempts a single publish may make.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_durable() {
        let config = TransportConfig::default();

        assert_eq!(config.ack_mode(), AckMode::All);
        assert!(config.idempotent());
        assert_eq!(config.max_attempts(), 4);
    }

    #[test]
    fn test_with_durability_accepts_all() {
        let config = TransportConfig::new("nats://broker:4222")
            .with_durability("ALL", true)
            .unwrap();

        assert_eq!(config.servers, "nats://broker:4222");
        assert_eq!(config.ack_mode(), AckMode::All);
    }

    #[test]
    fn test_with_durability_rejects_weaker_acks() {
        let result = TransportConfig::default().with_durability("1", true);

        assert_eq!(
            result,
            Err(TransportConfigError::UnsupportedAcks("1".to_owned()))
        );
    }

    #[test]
    fn test_with_durability_rejects_disabling_idempotence() {
        let result = TransportConfig::default().with_durability("all", false);

        assert_eq!(result, Err(TransportConfigError::IdempotenceRequired));
    }
}
