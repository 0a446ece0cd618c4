//! Courier Transport: delivers outbox payloads to NATS `JetStream`.
//!
//! A publish is only reported successful once the stream acknowledged it.
//! Keys travel as the `Nats-Msg-Id` header so the stream drops duplicates of
//! a retried publish inside its duplicate window.

pub mod backoff;
pub mod config;
pub mod nats;

pub use backoff::Backoff;
pub use config::{AckMode, StreamSettings, TransportConfig, TransportConfigError};
pub use nats::NatsTransport;
