//! Exponential backoff between publish attempts.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with optional jitter.
///
/// ```text
/// attempt   delay (initial = 100ms, max = 2s)
///    1          100ms
///    2          200ms
///    3          400ms
///   ...
///    6+         2s
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub initial: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Jitter factor in `[0.0, 1.0]`; `0.1` means ±10%.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(2),
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .initial
            .saturating_mul(2_u32.pow(exponent))
            .min(self.max);

        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return base;
        }

        let factor = 1.0 + rand::rng().random_range(-jitter..=jitter);
        base.mul_f64(factor).min(self.max)
    }
}
