//! Backoff policy for upstream calls, kept free of I/O so timing can be
//! asserted without sleeping.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// First backoff step; doubles per retry.
    pub base: Duration,
    /// Upper bound applied to an upstream-supplied wait hint.
    pub max_hint: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_secs(1),
            max_hint: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` when retries are exhausted.
    ///
    /// `attempt` is the 0-based index of the attempt that just failed. An
    /// explicit hint wins over the exponential step (1s, 2s, 4s with the
    /// defaults) but is capped at `max_hint`.
    pub fn next_delay(&self, attempt: u32, hint: Option<Duration>) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        match hint {
            Some(h) => Some(h.min(self.max_hint)),
            None => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                Some(self.base.saturating_mul(factor))
            }
        }
    }

    /// Same policy with no waiting; used by tests and the probe route.
    pub fn immediate() -> Self {
        Self {
            base: Duration::ZERO,
            max_hint: Duration::ZERO,
            ..Self::default()
        }
    }
}
