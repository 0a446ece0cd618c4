//! Application layer for the user service.

pub mod command_handlers;
