//! Domain layer for the user service.

pub mod commands;
pub mod events;
pub mod store;
pub mod topics;
pub mod user;
