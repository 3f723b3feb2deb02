//! Exponential backoff schedule for outbox delivery.

use std::time::Duration;

use rand::Rng;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(15 * 60);
const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Retry schedule with exponential backoff and jitter.
///
/// Attempts are 1-based: the first retry waits `base_delay`, each further
/// retry doubles it up to `max_delay`, and a uniform jitter of
/// `±jitter_factor` spreads concurrent retries out.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt budget before an entry is parked as a dead letter
    pub max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with an explicit schedule and no jitter.
    #[must_use]
    pub fn fixed(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts, base_delay, max_delay, jitter_factor: 0.0 }
    }

    /// Backoff delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self.base_delay.saturating_mul(2_u32.saturating_pow(exponent));
        let capped = raw.min(self.max_delay);

        if self.jitter_factor <= 0.0 {
            return capped;
        }
        let jitter = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
        capped.mul_f64((1.0 + jitter).max(0.0))
    }

    /// Epoch seconds of the next attempt after `attempts_made` failures, or
    /// `None` when the budget is spent and the entry should be parked.
    #[must_use]
    pub fn next_attempt_at(&self, attempts_made: u32, now: i64) -> Option<i64> {
        if attempts_made >= self.max_attempts {
            return None;
        }
        let delay = self.delay_for(attempts_made);
        Some(now + i64::try_from(delay.as_secs()).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_up_to_the_cap() {
        let policy =
            RetryPolicy::fixed(5, Duration::from_secs(5), Duration::from_secs(60));

        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(20));
        assert_eq!(policy.delay_for(4), Duration::from_secs(40));
        assert_eq!(policy.delay_for(5), Duration::from_secs(60));
        assert_eq!(policy.delay_for(20), Duration::from_secs(60));
    }

    #[test]
    fn budget_exhaustion_parks_the_entry() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(5), Duration::from_secs(60));

        assert_eq!(policy.next_attempt_at(1, 1_000), Some(1_005));
        assert_eq!(policy.next_attempt_at(2, 1_000), Some(1_010));
        assert_eq!(policy.next_attempt_at(3, 1_000), None);
        assert_eq!(policy.next_attempt_at(4, 1_000), None);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(600),
            jitter_factor: 0.2,
        };

        for _ in 0..100 {
            let delay = policy.delay_for(1).as_secs_f64();
            assert!((8.0..=12.0).contains(&delay), "delay out of jitter bounds: {delay}");
        }
    }
}
