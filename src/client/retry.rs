use std::time::Duration;

use crate::client::consts::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL_MS};

/// Fixed-delay, bounded-attempt reconnection schedule.
///
/// Attempts are numbered from 1 and count consecutive failures since the last
/// successful open. No backoff and no jitter: the peer is local and stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    max_retries: u32,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay to wait before reconnect attempt `attempt`, or `None` once the
    /// budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        (1..=self.max_retries)
            .contains(&attempt)
            .then_some(self.interval)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(
            Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            DEFAULT_MAX_RETRIES,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delay_is_fixed() {
        let policy = RetryPolicy::default();
        for attempt in [1, 2, 500, 999, 1000] {
            assert_eq!(policy.delay_for(attempt), Some(Duration::from_millis(5000)));
        }
    }

    #[test]
    fn test_budget_is_bounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1001), None);
        assert_eq!(policy.delay_for(u32::MAX), None);
        assert_eq!(policy.delay_for(0), None);
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let policy = RetryPolicy::fixed(Duration::from_millis(10), 0);
        assert_eq!(policy.delay_for(1), None);
    }
}
