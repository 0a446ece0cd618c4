//! Per-cycle outcome counters.

/// What one dispatch cycle did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Pending rows fetched.
    pub fetched: usize,
    /// Rows the broker acknowledged.
    pub sent: usize,
    /// Rows whose publish failed.
    pub failed: usize,
    /// Rows that exhausted their attempts and became `DEAD`.
    pub dead: usize,
    /// Dead-letter envelopes the broker acknowledged.
    pub dead_lettered: usize,
    /// Dead-letter envelopes that could not be published.
    pub dead_letter_failures: usize,
    /// Acknowledged rows that could not be marked `SENT`.
    pub mark_failures: usize,
    /// Failed publishes that could not be recorded.
    pub record_failures: usize,
    /// Rows left for the next cycle after the deadline or shutdown.
    pub deferred: usize,
}

impl DispatchReport {
    /// Rows that left the `PENDING` state during this cycle.
    #[must_use]
    pub fn settled(&self) -> usize {
        self.sent.saturating_sub(self.mark_failures) + self.dead
    }

    /// Whether the cycle fetched as many rows as it was allowed to.
    #[must_use]
    pub fn is_full_batch(&self, batch_size: usize) -> bool {
        batch_size > 0 && self.fetched >= batch_size
    }
}
