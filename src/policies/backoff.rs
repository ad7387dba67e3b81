//! # Backoff policy shared by retries and poll intervals.
//!
//! [`BackoffPolicy`] controls how delays grow across repeated attempts.
//! It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for step `n` (0-indexed) is `first × factor^n`, clamped to `max`, then
//! jitter is applied and the result is clamped to `max` again. The base is derived
//! purely from the step number, so jitter never feeds back into later delays.
//!
//! Two users:
//! - the retry executor (`factor = 2.0`, additive jitter): `delay(a) = min(base·2^(a-1) + jitter, max)`
//! - the status poller (`factor = 1.5`, no jitter): `interval(n) = min(initial·1.5^n, max_interval)`
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use jobvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! // 100ms × 2^10 = 102_400ms → capped at max=10s
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Exponential backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay for step 0.
    pub first: Duration,
    /// Maximum delay cap (applied after jitter).
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy to prevent thundering herd.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Retry defaults:
    /// - `first = 1s`;
    /// - `max = 10s`;
    /// - `factor = 2.0`;
    /// - `jitter = [0, 200ms)` additive.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: JitterPolicy::RETRY_DEFAULT,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given step (0-indexed).
    ///
    /// # Notes
    /// - If `factor` equals 1.0, delay remains constant at `first` (up to `max`).
    /// - If `factor` is greater than 1.0, delays grow exponentially up to `max`.
    /// - Overflowing or non-finite intermediate values clamp to `max`.
    pub fn next(&self, step: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = step.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        self.jitter.apply(base).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn plain(first_ms: u64, max_ms: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_step_zero_returns_first() {
        assert_eq!(plain(100, 30_000, 2.0).next(0), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let policy = plain(100, 30_000, 2.0);
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(3), Duration::from_millis(800));
        assert_eq!(policy.next(4), Duration::from_millis(1600));
    }

    #[test]
    fn test_poll_interval_growth() {
        let policy = plain(2000, 10_000, 1.5);
        assert_eq!(policy.next(0), Duration::from_millis(2000));
        assert_eq!(policy.next(1), Duration::from_millis(3000));
        assert_eq!(policy.next(2), Duration::from_millis(4500));
        assert_eq!(policy.next(3), Duration::from_millis(6750));
        assert_eq!(policy.next(4), Duration::from_millis(10_000));
        assert_eq!(policy.next(5), Duration::from_millis(10_000));
    }

    #[test]
    fn test_first_exceeds_max() {
        assert_eq!(plain(10_000, 5_000, 2.0).next(0), Duration::from_millis(5_000));
    }

    #[test]
    fn test_additive_jitter_bounds_per_attempt() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::RETRY_DEFAULT,
        };
        for attempt in 1..=6u32 {
            let floor = Duration::from_millis(100 * 2u64.pow(attempt - 1));
            for _ in 0..50 {
                let delay = policy.next(attempt - 1);
                assert!(delay >= floor, "attempt {attempt}: {delay:?} < {floor:?}");
                assert!(
                    delay <= floor + Duration::from_millis(200),
                    "attempt {attempt}: {delay:?} > {floor:?} + 200ms"
                );
            }
        }
    }

    #[test]
    fn test_jitter_never_exceeds_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(900),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::RETRY_DEFAULT,
        };
        for _ in 0..100 {
            assert!(policy.next(0) <= Duration::from_secs(1));
            assert_eq!(policy.next(3), Duration::from_secs(1));
        }
    }

    #[test]
    fn test_non_finite_overflow_clamps_to_max() {
        assert_eq!(plain(100, 10_000, 2.0).next(u32::MAX), Duration::from_secs(10));
    }
}
