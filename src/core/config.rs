//! # Global orchestrator configuration.
//!
//! Provides [`Config`], the centralized settings for an [`Orchestrator`](crate::Orchestrator).
//!
//! Config is split by concern:
//! - [`CacheConfig`] for the task cache (TTL, sweep interval);
//! - [`PollConfig`] for status polling (interval growth, absolute timeout);
//! - [`RetryPolicy`] for every remote call (submit, check, continue).
//!
//! ## Sentinel values
//! - `cache.sweep_interval = 0s` → no background sweeper (lazy expiry only)
//! - `max_items_per_request = 0` → the remote has no per-request output cap

use std::time::Duration;

use crate::cache::CacheConfig;
use crate::core::poller::PollConfig;
use crate::policies::RetryPolicy;

/// Global configuration for the orchestrator.
///
/// ## Field semantics
/// - `cache`: entry TTL and eviction sweep cadence
/// - `poll`: poll interval growth and the absolute poll timeout
/// - `retry`: retry bound, backoff and classification for remote calls
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `max_items_per_request`: how many outputs the remote produces per submission
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors over
/// sprinkling sentinel checks (`0`) across the codebase.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use jobvisor::Config;
///
/// let mut cfg = Config::default();
/// cfg.poll.timeout = Duration::from_secs(120);
/// cfg.retry.max_retries = 5;
///
/// assert_eq!(cfg.output_cap(), Some(4));
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Task cache settings.
    pub cache: CacheConfig,

    /// Status polling settings.
    pub poll: PollConfig,

    /// Retry policy applied to every remote call.
    pub retry: RetryPolicy,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Outputs the remote service produces per submission.
    ///
    /// A job requesting more than this needs a continuation. Once the continuation
    /// was sent, a `Completed` status with fewer items than requested is treated as
    /// still outstanding.
    pub max_items_per_request: usize,
}

impl Config {
    /// Returns the per-request output cap as an `Option`.
    ///
    /// - `None` → no cap
    /// - `Some(n)` → at most `n` outputs per submission
    #[inline]
    pub fn output_cap(&self) -> Option<usize> {
        match self.max_items_per_request {
            0 => None,
            n => Some(n),
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `cache = CacheConfig::default()` (TTL 30 min, sweep every 5 min)
    /// - `poll = PollConfig::default()` (2s → 10s, ×1.5, timeout 600s)
    /// - `retry = RetryPolicy::default()` (3 retries, 1s → 10s, ×2, +[0, 200ms))
    /// - `bus_capacity = 1024`
    /// - `max_items_per_request = 4`
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            poll: PollConfig::default(),
            retry: RetryPolicy::default(),
            bus_capacity: 1024,
            max_items_per_request: 4,
        }
    }
}
