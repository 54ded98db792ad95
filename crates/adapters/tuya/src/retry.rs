//! Capped exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// How often and how patiently one class of failure is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: f64,
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt; zero is treated as one.
    /// `jitter` is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter: f64) -> Self {
        let jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `failures`-th consecutive failure, before jitter:
    /// `min(base * 2^(failures - 1), max_delay)`.
    #[must_use]
    pub fn nominal_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        let factor = 2_u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Bounds the jittered delay is drawn from. The upper bound never
    /// exceeds the next window's lower bound, so delays never decrease.
    #[must_use]
    pub fn delay_window(&self, failures: u32) -> (Duration, Duration) {
        let low = self.nominal_delay(failures);
        let high = Duration::try_from_secs_f64(low.as_secs_f64() * (1.0 + self.jitter))
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        (low, high.max(low))
    }

    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            failures: 0,
            last_delay: Duration::ZERO,
        }
    }
}

/// Retry state of a single logical call.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
    last_delay: Duration,
}

impl Backoff {
    /// Failed attempts recorded so far.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failed attempt and return how long to wait before the next
    /// one, or `None` once the attempt budget is spent.
    ///
    /// A server-supplied `Retry-After` acts as a floor on the delay.
    pub fn record_failure(&mut self, retry_after: Option<Duration>) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.policy.max_attempts {
            return None;
        }
        let (low, high) = self.policy.delay_window(self.failures);
        let jittered = if high > low {
            rand::thread_rng().gen_range(low..=high)
        } else {
            low
        };
        let delay = retry_after
            .map_or(jittered, |floor| jittered.max(floor))
            .max(self.last_delay);
        self.last_delay = delay;
        Some(delay)
    }
}
