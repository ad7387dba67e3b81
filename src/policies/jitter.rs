//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays to prevent thundering herd effects
//! when many callers retry against the remote service at the same instant.
//!
//! - [`JitterPolicy::None`] no randomization, predictable delays
//! - [`JitterPolicy::Additive`] delay + random[0, max) (the retry executor default)
//! - [`JitterPolicy::Full`] random delay in [0, backoff_delay]

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JitterPolicy {
    /// No jitter: use exact backoff delay.
    ///
    /// Use for poll intervals and in tests where timing must be predictable.
    #[default]
    None,

    /// Additive jitter: delay + random[0, `max`).
    ///
    /// Never shortens the computed delay, so the exponential floor is preserved.
    Additive {
        /// Exclusive upper bound of the added randomness.
        max: Duration,
    },

    /// Full jitter: random delay in [0, backoff_delay].
    ///
    /// Most aggressive spreading; can significantly reduce the delay.
    Full,
}

impl JitterPolicy {
    /// Jitter used by the retry executor by default: uniform in `[0, 200ms)`.
    pub const RETRY_DEFAULT: JitterPolicy = JitterPolicy::Additive {
        max: Duration::from_millis(200),
    };

    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Additive { max } => self.additive_jitter(delay, *max),
            JitterPolicy::Full => self.full_jitter(delay),
        }
    }

    /// Additive jitter: delay + random[0, max)
    fn additive_jitter(&self, delay: Duration, max: Duration) -> Duration {
        let max_us = max.as_micros() as u64;
        if max_us == 0 {
            return delay;
        }
        let mut rng = rand::rng();
        delay.saturating_add(Duration::from_micros(rng.random_range(0..max_us)))
    }

    /// Full jitter: random[0, delay]
    fn full_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.random_range(0..=ms))
    }
}
