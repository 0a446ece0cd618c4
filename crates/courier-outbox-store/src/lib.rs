//! Courier Outbox Store: PostgreSQL persistence for outbox rows.

pub mod notify;
pub mod pg_outbox_repository;
pub mod schema;

pub use notify::{PENDING_CHANNEL, PendingListener};
pub use pg_outbox_repository::PgOutboxRepository;
