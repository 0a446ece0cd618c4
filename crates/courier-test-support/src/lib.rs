//! Shared test mocks and utilities for Courier.

mod clock;
mod outbox;
mod transport;

pub use clock::FixedClock;
pub use outbox::{FailingOutboxRepository, InMemoryOutbox, InMemoryUnitOfWork};
pub use transport::{PublishedMessage, RecordingTransport};
