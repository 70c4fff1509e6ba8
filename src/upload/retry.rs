use std::time::Duration;

/// Linear backoff: the n-th failure waits `base_delay × n`, and the
/// `max_failures`-th failure gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_failures: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_failures: u32) -> Self {
        Self {
            base_delay,
            max_failures,
        }
    }

    /// Delay before the next attempt after `failures` failures so far,
    /// or `None` once the cap is reached.
    pub fn delay_after(&self, failures: u32) -> Option<Duration> {
        if failures == 0 || failures >= self.max_failures {
            return None;
        }
        Some(self.base_delay.saturating_mul(failures))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), 10)
    }
}
