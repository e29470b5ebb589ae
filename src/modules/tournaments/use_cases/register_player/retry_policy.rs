use std::time::Duration;

/// Bounds on the optimistic retry loop.
///
/// Only version conflicts are retried. `attempt_timeout` wraps each transaction and
/// `deadline`, when set, caps the whole call including backoff sleeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub deadline: Option<Duration>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            attempt_timeout: Duration::from_secs(2),
            deadline: None,
            initial_backoff: Duration::from_millis(2),
            max_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Sleep before attempt `attempt + 1`, after `attempt` conflicting attempts.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Time budget for the next attempt given how long the call has run so far.
    /// `None` once the deadline has passed.
    pub fn budget(&self, elapsed: Duration) -> Option<Duration> {
        match self.deadline {
            Some(deadline) => deadline
                .checked_sub(elapsed)
                .filter(|remaining| !remaining.is_zero())
                .map(|remaining| remaining.min(self.attempt_timeout)),
            None => Some(self.attempt_timeout),
        }
    }
}
