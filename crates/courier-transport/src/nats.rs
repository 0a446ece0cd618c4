//! NATS `JetStream` implementation of `TransportClient`.

use std::fmt;

use async_nats::header::NATS_MESSAGE_ID;
use async_nats::jetstream::{self, stream};
use async_nats::{Client, ConnectOptions, HeaderMap};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use courier_core::error::ProducerError;
use courier_core::transport::TransportClient;

use crate::config::{StreamSettings, TransportConfig};

/// Header carrying the ordering key for consumers.
pub const KEY_HEADER: &str = "Courier-Key";

struct Connection {
    client: Client,
    jetstream: jetstream::Context,
}

/// Transport client publishing to NATS `JetStream`.
///
/// The connection handle never leaves this type. Every publish waits for the
/// stream acknowledgment, retrying within the configured budget.
pub struct NatsTransport {
    config: TransportConfig,
    connection: RwLock<Option<Connection>>,
}

impl fmt::Debug for NatsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsTransport")
            .field("servers", &self.config.servers)
            .field("client_name", &self.config.client_name)
            .finish_non_exhaustive()
    }
}

impl NatsTransport {
    /// Creates an unstarted transport.
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            connection: RwLock::new(None),
        }
    }

    /// The configuration this transport was built with.
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Whether `start` has been called without a matching `stop`.
    pub async fn is_started(&self) -> bool {
        self.connection.read().await.is_some()
    }

    /// Deduplication id for a keyed message.
    ///
    /// Scoped by topic so a dead-letter envelope keyed by the same outbox id
    /// is not mistaken for a duplicate of the original message.
    #[must_use]
    pub fn message_id(topic: &str, key: &str) -> String {
        format!("{topic}:{key}")
    }

    /// Deduplication id for one revision of a keyed message.
    #[must_use]
    pub fn revision_message_id(topic: &str, key: &str, revision: i32) -> String {
        format!("{topic}:{key}:{revision}")
    }

    /// Headers attached to a publish.
    #[must_use]
    pub fn headers(topic: &str, key: Option<&str>) -> HeaderMap {
        match key {
            Some(key) => Self::keyed_headers(&Self::message_id(topic, key), key),
            None => HeaderMap::new(),
        }
    }

    fn keyed_headers(message_id: &str, key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(NATS_MESSAGE_ID, message_id);
        headers.insert(KEY_HEADER, key);
        headers
    }

    async fn ensure_stream(
        jetstream: &jetstream::Context,
        settings: &StreamSettings,
    ) -> Result<(), ProducerError> {
        let config = stream::Config {
            name: settings.name.clone(),
            subjects: settings.subjects.clone(),
            num_replicas: settings.replicas,
            duplicate_window: settings.duplicate_window,
            storage: stream::StorageType::File,
            ..Default::default()
        };

        jetstream
            .get_or_create_stream(config)
            .await
            .map_err(|e| ProducerError::Connection(format!("stream {}: {e}", settings.name)))?;

        info!(
            stream = %settings.name,
            replicas = settings.replicas,
            "stream ready"
        );
        Ok(())
    }

    async fn send(
        &self,
        topic: &str,
        payload: &serde_json::Value,
        headers: HeaderMap,
    ) -> Result<(), ProducerError> {
        let jetstream = self
            .connection
            .read()
            .await
            .as_ref()
            .map(|c| c.jetstream.clone())
            .ok_or(ProducerError::NotStarted)?;

        let bytes =
            serde_json::to_vec(payload).map_err(|e| ProducerError::Serialization(e.to_string()))?;
        let max_attempts = self.config.max_attempts();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .attempt(&jetstream, topic, headers.clone(), bytes.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(reason) if attempt >= max_attempts => {
                    return Err(ProducerError::Unacknowledged {
                        topic: topic.to_owned(),
                        attempts: attempt,
                        reason,
                    });
                }
                Err(reason) => {
                    let delay = self.config.backoff.delay_for(attempt);
                    warn!(attempt, ?delay, %reason, "publish attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        jetstream: &jetstream::Context,
        topic: &str,
        headers: HeaderMap,
        payload: Vec<u8>,
    ) -> Result<(), String> {
        let publish = async {
            let ack = jetstream
                .publish_with_headers(topic.to_owned(), headers, payload.into())
                .await
                .map_err(|e| e.to_string())?;
            ack.await.map_err(|e| e.to_string())
        };

        match tokio::time::timeout(self.config.ack_timeout, publish).await {
            Ok(Ok(ack)) => {
                if ack.duplicate {
                    debug!(
                        stream = %ack.stream,
                        sequence = ack.sequence,
                        "broker suppressed duplicate publish"
                    );
                }
                Ok(())
            }
            Ok(Err(reason)) => Err(reason),
            Err(_) => Err(format!(
                "no acknowledgment within {}ms",
                self.config.ack_timeout.as_millis()
            )),
        }
    }
}

#[async_trait]
impl TransportClient for NatsTransport {
    async fn start(&self) -> Result<(), ProducerError> {
        let mut connection = self.connection.write().await;
        if connection.is_some() {
            return Err(ProducerError::AlreadyStarted);
        }

        let client = ConnectOptions::new()
            .name(&self.config.client_name)
            .connection_timeout(self.config.connection_timeout)
            .connect(self.config.servers.as_str())
            .await
            .map_err(|e| ProducerError::Connection(e.to_string()))?;
        let jetstream = jetstream::new(client.clone());

        if let Some(settings) = &self.config.stream {
            Self::ensure_stream(&jetstream, settings).await?;
        }

        info!(servers = %self.config.servers, "transport connected");
        *connection = Some(Connection { client, jetstream });
        Ok(())
    }

    async fn stop(&self) {
        let Some(connection) = self.connection.write().await.take() else {
            return;
        };

        if let Err(e) = connection.client.flush().await {
            warn!(error = %e, "flush on stop failed");
        }
        info!(servers = %self.config.servers, "transport disconnected");
    }

    #[instrument(skip(self, payload), fields(topic = %topic, key = ?key))]
    async fn publish(
        &self,
        topic: &str,
        payload: &serde_json::Value,
        key: Option<&str>,
    ) -> Result<(), ProducerError> {
        self.send(topic, payload, Self::headers(topic, key)).await
    }

    #[instrument(skip(self, payload), fields(topic = %topic, key = %key))]
    async fn publish_revision(
        &self,
        topic: &str,
        payload: &serde_json::Value,
        key: &str,
        revision: i32,
    ) -> Result<(), ProducerError> {
        let message_id = Self::revision_message_id(topic, key, revision);
        self.send(topic, payload, Self::keyed_headers(&message_id, key))
            .await
    }
}
