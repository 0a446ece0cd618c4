//! Push trigger for the dispatch loop.

use std::sync::Arc;

use tokio::sync::Notify;

/// Cloneable handle that wakes a running dispatcher ahead of its next poll.
///
/// Notifications sent while a cycle is in progress are kept, so the loop
/// runs one more cycle right after. Repeated notifications coalesce.
#[derive(Debug, Clone, Default)]
pub struct DispatchTrigger {
    notify: Arc<Notify>,
}

impl DispatchTrigger {
    /// Creates a trigger not yet attached to a dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the dispatcher to run a cycle now.
    pub fn notify(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}
