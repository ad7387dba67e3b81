//! Retry and backoff policies.
//!
//! This module groups the knobs that control **if** a failed remote call is retried
//! and **how long** to wait between attempts or between status checks.
//!
//! ## Contents
//! - [`RetryPolicy`]   whether/how often to retry (max retries + classifier)
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid thundering herd
//!
//! ## Quick wiring
//! ```text
//! RetryPolicy { max_retries, backoff: BackoffPolicy, classifier }
//!      └─► core::retry::RetryExecutor uses:
//!           - classifier to decide retry/fail
//!           - backoff.next(attempt - 1) to schedule the next attempt
//!
//! PollConfig { initial_interval, max_interval, backoff_factor, timeout }
//!      └─► core::poller::StatusPoller derives a jitter-free BackoffPolicy
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → 3 retries, first=1s, factor=2.0, max=10s, jitter=+[0, 200ms).
//! - `JitterPolicy::None` by default; retries use [`JitterPolicy::RETRY_DEFAULT`].

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::{Classifier, RetryPolicy};
