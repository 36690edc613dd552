//! Backoff policy for throttled requests

use rand::Rng;
use std::time::Duration;

use crate::config::GatewayConfig;

/// Retry policy applied to "too many requests" answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries granted after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubled on every further retry
    pub base_delay: Duration,
    /// Extra random delay, as a percentage of the computed delay
    pub jitter_percent: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            jitter_percent: 0,
        }
    }
}

impl From<&GatewayConfig> for RetryPolicy {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
            jitter_percent: config.retry_jitter_percent,
        }
    }
}

impl RetryPolicy {
    /// Whether a request that has already been retried `attempt` times may go again
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// `base * 2^attempt`, plus jitter when configured
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let delay = self.base_delay.saturating_mul(factor);
        if self.jitter_percent == 0 {
            return delay;
        }

        let max_jitter_ms = delay.as_millis() as u64 * self.jitter_percent as u64 / 100;
        if max_jitter_ms == 0 {
            return delay;
        }
        let jitter_ms = rand::rng().random_range(0..=max_jitter_ms);
        delay + Duration::from_millis(jitter_ms)
    }
}
