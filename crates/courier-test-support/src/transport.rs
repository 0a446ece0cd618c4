//! Test transports: mock `TransportClient` implementations for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use courier_core::error::ProducerError;
use courier_core::transport::TransportClient;

/// One `publish` call as seen by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    /// Destination topic.
    pub topic: String,
    /// Payload as passed in.
    pub payload: serde_json::Value,
    /// Message key.
    pub key: Option<String>,
    /// Revision passed to `publish_revision`, if it was used.
    pub revision: Option<i32>,
    /// Whether the call was acknowledged.
    pub acknowledged: bool,
}

#[derive(Debug, Default)]
struct Script {
    started: bool,
    stop_calls: usize,
    calls: Vec<PublishedMessage>,
    failing_topics: HashSet<String>,
    failing_keys: HashMap<String, u32>,
    failing_calls: HashSet<usize>,
}

/// A transport that records every `publish` call in order and fails the
/// calls a test scripted to fail.
#[derive(Debug)]
pub struct RecordingTransport {
    enforce_start: bool,
    script: Mutex<Script>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// A transport that behaves as already connected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enforce_start: false,
            script: Mutex::new(Script {
                started: true,
                ..Script::default()
            }),
        }
    }

    /// A transport that rejects `publish` until `start` is called.
    #[must_use]
    pub fn unstarted() -> Self {
        Self {
            enforce_start: true,
            script: Mutex::new(Script::default()),
        }
    }

    /// Every publish to `topic` fails from now on.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_topic(&self, topic: &str) {
        self.script
            .lock()
            .unwrap()
            .failing_topics
            .insert(topic.to_owned());
    }

    /// The next `times` publishes carrying `key` fail.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_key(&self, key: &str, times: u32) {
        self.script
            .lock()
            .unwrap()
            .failing_keys
            .insert(key.to_owned(), times);
    }

    /// The publish call with zero-based index `index` fails.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_call(&self, index: usize) {
        self.script.lock().unwrap().failing_calls.insert(index);
    }

    /// Every `publish` call, acknowledged or not, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<PublishedMessage> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Acknowledged publishes, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.calls().into_iter().filter(|m| m.acknowledged).collect()
    }

    /// Acknowledged publishes to `topic`, in call order.
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }

    fn record(
        &self,
        topic: &str,
        payload: &serde_json::Value,
        key: Option<&str>,
        revision: Option<i32>,
    ) -> Result<(), ProducerError> {
        let mut script = self.script.lock().unwrap();
        if !script.started {
            return Err(ProducerError::NotStarted);
        }

        let index = script.calls.len();
        let mut fails =
            script.failing_calls.contains(&index) || script.failing_topics.contains(topic);
        if let Some(remaining) = key.and_then(|k| script.failing_keys.get_mut(k))
            && *remaining > 0
        {
            *remaining -= 1;
            fails = true;
        }

        script.calls.push(PublishedMessage {
            topic: topic.to_owned(),
            payload: payload.clone(),
            key: key.map(str::to_owned),
            revision,
            acknowledged: !fails,
        });

        if fails {
            Err(ProducerError::Unacknowledged {
                topic: topic.to_owned(),
                attempts: 1,
                reason: "scripted failure".into(),
            })
        } else {
            Ok(())
        }
    }

    /// Whether the transport is currently started.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn is_started(&self) -> bool {
        self.script.lock().unwrap().started
    }

    /// Number of `stop` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stop_calls(&self) -> usize {
        self.script.lock().unwrap().stop_calls
    }
}

#[async_trait]
impl TransportClient for RecordingTransport {
    async fn start(&self) -> Result<(), ProducerError> {
        let mut script = self.script.lock().unwrap();
        if script.started && self.enforce_start {
            return Err(ProducerError::AlreadyStarted);
        }
        script.started = true;
        Ok(())
    }

    async fn stop(&self) {
        let mut script = self.script.lock().unwrap();
        script.started = false;
        script.stop_calls += 1;
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &serde_json::Value,
        key: Option<&str>,
    ) -> Result<(), ProducerError> {
        self.record(topic, payload, key, None)
    }

    async fn publish_revision(
        &self,
        topic: &str,
        payload: &serde_json::Value,
        key: &str,
        revision: i32,
    ) -> Result<(), ProducerError> {
        self.record(topic, payload, Some(key), Some(revision))
    }
}
