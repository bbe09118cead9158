//! Retry policy with exponential backoff for activity attempts.

use std::time::Duration;

/// Retry policy applied to every activity invocation.
///
/// `max_attempts` counts the total attempts including the first one, so the
/// default of 3 means one initial call plus up to two retries. Delays grow
/// exponentially and are capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
    /// Backoff multiplier per retry.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Override the total attempt count.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the initial retry delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay before the retry following the given completed attempt
    /// (1-based).
    ///
    /// Uses exponential backoff: `initial_delay * multiplier^(attempt - 1)`,
    /// capped at `max_delay`.
    #[must_use]
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn backoff_is_capped_at_max_delay() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(1),
            multiplier: 10.0,
            max_delay: Duration::from_secs(2),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_after_attempt(5), Duration::from_secs(2));
    }

    #[test]
    fn no_retries_policy_has_single_attempt() {
        assert_eq!(RetryPolicy::no_retries().max_attempts, 1);
    }
}
