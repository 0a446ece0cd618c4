//! Process configuration read from the environment.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use courier_dispatcher::{DEFAULT_DEAD_LETTER_TOPIC, DispatcherConfig};
use courier_transport::{StreamSettings, TransportConfig, TransportConfigError};
use courier_users::domain::topics::UserTopics;

use crate::error::AppError;

/// Everything the relay needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Health server bind host.
    pub host: String,
    /// Health server bind port.
    pub port: u16,
    /// Connection pool size.
    pub database_max_connections: u32,
    /// Broker connection and publish settings.
    pub transport: TransportConfig,
    /// Topic names for user events.
    pub topics: UserTopics,
    /// Dispatch loop settings.
    pub dispatcher: DispatcherConfig,
    /// OTLP collector endpoint; trace export is off when unset.
    pub otlp_endpoint: Option<String>,
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String, AppError> {
        self.optional(name)
            .ok_or_else(|| AppError::Config(format!("{name} environment variable must be set")))
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_owned())
    }

    fn parse<T>(&self, name: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.optional(name) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{name} is invalid ({raw:?}): {e}"))),
            None => Ok(default),
        }
    }

    fn millis(&self, name: &str, default: u64) -> Result<Duration, AppError> {
        self.parse(name, default).map(Duration::from_millis)
    }
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first missing or invalid
    /// variable.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first missing or invalid
    /// variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let vars = Vars { lookup };

        let topics = UserTopics {
            created: vars.string("TOPIC_USERS_CREATED", "users.created"),
            updated: vars.string("TOPIC_USERS_UPDATED", "users.updated"),
            deleted: vars.string("TOPIC_USERS_DELETED", "users.deleted"),
        };

        // An explicitly empty value disables dead-lettering.
        let dead_letter_topic = match (vars.lookup)("DEAD_LETTER_TOPIC") {
            None => Some(DEFAULT_DEAD_LETTER_TOPIC.to_owned()),
            Some(topic) if topic.trim().is_empty() => None,
            Some(topic) => Some(topic.trim().to_owned()),
        };

        let batch_size: usize = vars.parse("DISPATCH_BATCH_SIZE", 100)?;
        if batch_size == 0 {
            return Err(AppError::Config(
                "DISPATCH_BATCH_SIZE must be greater than zero".into(),
            ));
        }
        let max_attempts: u32 = vars.parse("DISPATCH_MAX_ATTEMPTS", 5)?;
        let dispatcher = DispatcherConfig {
            batch_size,
            poll_interval: vars.millis("DISPATCH_POLL_INTERVAL_MS", 1000)?,
            cycle_deadline: vars.millis("DISPATCH_CYCLE_DEADLINE_MS", 30_000)?,
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            dead_letter_topic,
        };

        let transport = Self::transport(&vars, &topics, dispatcher.dead_letter_topic.as_deref())?;

        Ok(Self {
            database_url: vars.required("DATABASE_URL")?,
            host: vars.string("HOST", "0.0.0.0"),
            port: vars.parse("PORT", 3000)?,
            database_max_connections: vars.parse("DATABASE_MAX_CONNECTIONS", 10)?,
            transport,
            topics,
            dispatcher,
            otlp_endpoint: vars.optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    fn transport<F: Fn(&str) -> Option<String>>(
        vars: &Vars<F>,
        topics: &UserTopics,
        dead_letter_topic: Option<&str>,
    ) -> Result<TransportConfig, AppError> {
        let acks = vars.string("BROKER_ACKS", "all");
        let idempotent: bool = vars.parse("BROKER_IDEMPOTENT", true)?;

        let mut transport = TransportConfig::new(vars.string("BROKER_URL", "nats://localhost:4222"))
            .with_durability(&acks, idempotent)
            .map_err(|e| {
                let name = match e {
                    TransportConfigError::UnsupportedAcks(_) => "BROKER_ACKS",
                    TransportConfigError::IdempotenceRequired => "BROKER_IDEMPOTENT",
                };
                AppError::Config(format!("{name}: {e}"))
            })?;
        transport.client_name = vars.string("BROKER_CLIENT_NAME", "courier-relay");
        transport.ack_timeout = vars.millis("BROKER_ACK_TIMEOUT_MS", 5000)?;
        transport.max_retries = vars.parse("BROKER_MAX_RETRIES", 3)?;

        if let Some(name) = vars.optional("BROKER_STREAM") {
            let mut subjects = topics.all();
            subjects.extend(dead_letter_topic.map(str::to_owned));
            transport.stream = Some(StreamSettings {
                name,
                subjects,
                replicas: vars.parse("BROKER_STREAM_REPLICAS", 1)?,
                duplicate_window: vars.millis("BROKER_DUPLICATE_WINDOW_MS", 120_000)?,
            });
        }

        Ok(transport)
    }

    /// Socket address of the health server.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST` and `PORT` do not form a valid
    /// address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}
