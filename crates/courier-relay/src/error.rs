//! Courier relay: process error types.

use courier_core::error::ProducerError;
use thiserror::Error;

/// Startup and runtime errors for the relay process.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migrations could not be applied.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The broker connection could not be established.
    #[error("transport error: {0}")]
    Transport(#[from] ProducerError),

    /// Tracing or trace export could not be set up.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_keeps_producer_message() {
        let err = AppError::from(ProducerError::Connection("refused".into()));

        assert_eq!(
            err.to_string(),
            "transport error: broker connection failed: refused"
        );
    }

    #[test]
    fn test_config_error_names_the_problem() {
        let err = AppError::Config("PORT must be a valid port number".into());

        assert_eq!(
            err.to_string(),
            "configuration error: PORT must be a valid port number"
        );
    }
}
