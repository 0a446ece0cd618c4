//! Courier Core: outbox data model and publishing abstractions.
//!
//! This crate defines the outbox record, the domain event trait, the error
//! taxonomy, and the traits the dispatcher is written against. It contains
//! no infrastructure code.

pub mod clock;
pub mod error;
pub mod event;
pub mod outbox;
pub mod repository;
pub mod transport;
