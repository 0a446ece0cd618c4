//! Dispatcher error types.

use courier_core::error::OutboxError;
use thiserror::Error;

/// A dispatch cycle that could not run at all.
///
/// Per-row failures never surface here; they are counted in the
/// [`crate::DispatchReport`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Pending rows could not be fetched.
    #[error("outbox store unavailable: {0}")]
    Store(#[from] OutboxError),
}
