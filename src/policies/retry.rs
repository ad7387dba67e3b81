//! # Retry policy for remote calls.
//!
//! [`RetryPolicy`] bundles the knobs used by the retry executor:
//! - [`RetryPolicy::max_retries`] retries after the first attempt (`k` → up to `k + 1` calls);
//! - [`RetryPolicy::backoff`] delay growth between attempts;
//! - an optional custom classifier replacing [`RemoteError::is_retryable`].
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use jobvisor::{BackoffPolicy, JitterPolicy, RemoteError, RetryPolicy};
//!
//! let policy = RetryPolicy::new(2)
//!     .with_backoff(BackoffPolicy {
//!         first: Duration::from_millis(10),
//!         max: Duration::from_secs(1),
//!         factor: 2.0,
//!         jitter: JitterPolicy::None,
//!     })
//!     // this endpoint answers 409 while a previous request is still settling
//!     .with_classifier(|e| matches!(e, RemoteError::Status { code: 409, .. }) || e.is_retryable());
//!
//! assert!(policy.should_retry(&RemoteError::status(409, "busy")));
//! assert_eq!(policy.delay_for(2), Duration::from_millis(20));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RemoteError;
use crate::policies::backoff::BackoffPolicy;

/// Shared retry classifier.
pub type Classifier = Arc<dyn Fn(&RemoteError) -> bool + Send + Sync>;

/// Bounded retry policy with classification-aware backoff.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay growth between attempts.
    pub backoff: BackoffPolicy,
    classifier: Option<Classifier>,
}

impl Default for RetryPolicy {
    /// Returns `max_retries = 3` with [`BackoffPolicy::default`] (1s → 10s, ×2, +[0, 200ms)).
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffPolicy::default(),
            classifier: None,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_retries` and default backoff.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Replaces the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the default classifier.
    #[must_use]
    pub fn with_classifier<F>(mut self, f: F) -> Self
    where
        F: Fn(&RemoteError) -> bool + Send + Sync + 'static,
    {
        self.classifier = Some(Arc::new(f));
        self
    }

    /// Whether `err` should be retried under this policy.
    pub fn should_retry(&self, err: &RemoteError) -> bool {
        match &self.classifier {
            Some(f) => f(err),
            None => err.is_retryable(),
        }
    }

    /// Backoff delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.next(attempt.saturating_sub(1))
    }

    /// Total number of calls allowed (`max_retries + 1`).
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("custom_classifier", &self.classifier.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;

    #[test]
    fn test_default_uses_error_classification() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert!(policy.should_retry(&RemoteError::status(502, "bad gateway")));
        assert!(!policy.should_retry(&RemoteError::status(403, "forbidden")));
    }

    #[test]
    fn test_custom_classifier_overrides_default() {
        let policy = RetryPolicy::default().with_classifier(|_| false);
        assert!(!policy.should_retry(&RemoteError::status(503, "unavailable")));
    }

    #[test]
    fn test_delay_for_is_one_based() {
        let policy = RetryPolicy::default().with_backoff(BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        });
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
    }
}
