//! Courier Dispatcher: moves committed outbox rows to the broker.
//!
//! The dispatcher reads pending rows in insertion order, publishes each one
//! keyed by its id, and transitions it to `SENT` after the broker
//! acknowledged it. Rows that keep failing become `DEAD` and are reported on
//! the dead-letter topic.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod report;
pub mod trigger;

pub use config::{DEFAULT_DEAD_LETTER_TOPIC, DispatcherConfig};
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use report::DispatchReport;
pub use trigger::DispatchTrigger;
