//! Shared application state.

use std::sync::Arc;

use courier_core::repository::OutboxRepository;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Outbox the relay dispatches from.
    pub outbox: Arc<dyn OutboxRepository>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(outbox: Arc<dyn OutboxRepository>) -> Self {
        Self { outbox }
    }
}
