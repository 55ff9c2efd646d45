//! Exponential backoff between connection test attempts

use rand::Rng;
use std::time::Duration;

/// Default delay before the first retry
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upper bound on a single delay
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Delay schedule `base * 2^(retry - 1)`: 0.5s, 1s, 2s, ... by default
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    /// Extra random delay as a fraction of the computed delay (0.0 to 1.0)
    jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_BASE)
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration) -> Self {
        Self { base, jitter: 0.0 }
    }

    /// Add up to `jitter * delay` of random extra wait. Jitter only ever
    /// lengthens a delay.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Delay before retry number `retry` (1-based); zero for `retry == 0`
    pub fn delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(retry - 1);
        let delay = self.base.saturating_mul(factor).min(MAX_DELAY);

        if self.jitter > 0.0 {
            let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
            delay + delay.mul_f64(extra)
        } else {
            delay
        }
    }

    /// Sum of the delays before the first `retries` retries
    pub fn total(&self, retries: u32) -> Duration {
        (1..=retries).map(|retry| self.delay(retry)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_doubles_from_half_second() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(2));
        assert_eq!(policy.total(3), Duration::from_millis(3500));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(40), MAX_DELAY);
    }

    #[test]
    fn test_jitter_only_lengthens() {
        let policy = BackoffPolicy::new(Duration::from_millis(100)).with_jitter(0.5);
        for _ in 0..50 {
            let delay = policy.delay(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }
}
