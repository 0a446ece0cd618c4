//! Persistence adapters for the user service.

pub mod pg_user_store;

pub use pg_user_store::PgUserStore;
