//! Courier: user service.
//!
//! Creates, renames and deletes users. Every mutation commits together with
//! the outbox row announcing it, so no change is lost relative to its event.

pub mod application;
pub mod domain;
pub mod infrastructure;
