//! Outbox store database schema.

/// SQL to create the outbox table and its pending-row index.
pub const CREATE_OUTBOX_TABLE: &str =
    include_str!("../../../migrations/0001_create_outbox_messages.sql");
