//! Dispatcher configuration.

use std::time::Duration;

/// Dead-letter topic used unless configured otherwise.
pub const DEFAULT_DEAD_LETTER_TOPIC: &str = "outbox.dead_letter";

/// Configuration for [`crate::Dispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum rows fetched per cycle.
    pub batch_size: usize,
    /// Wait between cycles when there is no backlog.
    pub poll_interval: Duration,
    /// Time after which a cycle stops starting new rows.
    pub cycle_deadline: Duration,
    /// Failed attempts after which a row becomes `DEAD`. `None` retries
    /// forever.
    pub max_attempts: Option<u32>,
    /// Topic receiving dead-letter envelopes. `None` disables them.
    pub dead_letter_topic: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_secs(1),
            cycle_deadline: Duration::from_secs(30),
            max_attempts: Some(5),
            dead_letter_topic: Some(DEFAULT_DEAD_LETTER_TOPIC.to_owned()),
        }
    }
}
