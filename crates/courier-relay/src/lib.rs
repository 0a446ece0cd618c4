//! Courier relay: wires the outbox store, transport and dispatcher into one
//! process and exposes a health endpoint.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
