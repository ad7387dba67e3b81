//! # Retry executor for remote calls.
//!
//! [`RetryExecutor`] runs a fallible remote operation under a [`RetryPolicy`]:
//!
//! ```text
//! loop:
//!   attempt += 1
//!   op() ── Ok(v) ───────────────────────────────────────► return Ok(v)
//!     └── Err(e)
//!          ├─ attempt > max_retries ─────────────────────► return Err(e)
//!          ├─ !policy.should_retry(&e) ──────────────────► return Err(e)
//!          └─ delay = policy.delay_for(attempt)
//!             publish(RetryScheduled) → sleep(delay) → loop
//! ```
//!
//! ## Rules
//! - A permanently failing retryable operation is called exactly `max_retries + 1` times.
//! - A non-retryable error returns after exactly one call.
//! - The last error is returned unchanged; it is never wrapped.
//! - Attempts run sequentially; the executor holds no state between `run` calls.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::error::RemoteError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RetryPolicy;

/// Runs remote operations with bounded, classified retries.
#[derive(Clone, Debug, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    bus: Option<Bus>,
}

impl RetryExecutor {
    /// Creates an executor for `policy`.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, bus: None }
    }

    /// Publishes [`EventKind::RetryScheduled`] on `bus` before every retry.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// The policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent.
    ///
    /// `context` names the operation in logs and events (e.g. `"check_status job-1"`).
    ///
    /// # Example
    /// ```rust
    /// use jobvisor::{RemoteError, RetryExecutor, RetryPolicy};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let exec = RetryExecutor::new(RetryPolicy::default());
    /// let res: Result<u32, RemoteError> = exec
    ///     .run("auth probe", || async { Err(RemoteError::status(401, "token expired")) })
    ///     .await;
    /// assert!(res.is_err()); // 401 is final, no retry and no sleep
    /// # }
    /// ```
    pub async fn run<T, F, Fut>(&self, context: &str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if attempt > self.policy.max_retries {
                tracing::debug!(op = context, attempt, err = %err, "retry budget exhausted");
                return Err(err);
            }
            if !self.policy.should_retry(&err) {
                tracing::debug!(op = context, attempt, kind = err.as_label(), "error is not retryable");
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            tracing::warn!(
                op = context,
                attempt,
                max_attempts = self.policy.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                err = %err,
                "remote call failed, retrying"
            );
            if let Some(bus) = &self.bus {
                bus.publish(
                    Event::new(EventKind::RetryScheduled)
                        .with_job(context)
                        .with_attempt(attempt)
                        .with_delay(delay)
                        .with_reason(err.to_string()),
                );
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Wraps `f` into a reusable operation that always runs under this executor.
    ///
    /// Every call of the returned closure is an independent [`run`](Self::run).
    pub fn wrap<T, F, Fut>(
        &self,
        context: impl Into<Arc<str>>,
        f: F,
    ) -> impl Fn() -> BoxFuture<'static, Result<T, RemoteError>> + Send + Sync + 'static
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RemoteError>> + Send + 'static,
        T: Send + 'static,
    {
        let exec = self.clone();
        let context: Arc<str> = context.into();
        move || {
            let exec = exec.clone();
            let context = Arc::clone(&context);
            let f = f.clone();
            async move { exec.run(&context, f).await }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportKind;
    use crate::policies::{BackoffPolicy, JitterPolicy};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_backoff(BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: JitterPolicy::RETRY_DEFAULT,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_503s_then_success() {
        let exec = RetryExecutor::new(fast_policy(3));
        let calls = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&calls);
        let res = exec
            .run("submit", move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RemoteError::status(503, "unavailable"))
                    } else {
                        Ok("job-1")
                    }
                }
            })
            .await;

        assert_eq!(res, Ok("job-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_short_circuits() {
        let exec = RetryExecutor::new(fast_policy(3));
        let calls = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&calls);
        let started = Instant::now();
        let res: Result<(), _> = exec
            .run("check_status job-1", move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err(RemoteError::status(401, "unauthorized")) }
            })
            .await;

        assert_eq!(res, Err(RemoteError::status(401, "unauthorized")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_is_k_plus_one() {
        for k in [0u32, 1, 4] {
            let exec = RetryExecutor::new(fast_policy(k));
            let calls = Arc::new(AtomicU32::new(0));

            let c = Arc::clone(&calls);
            let res: Result<(), _> = exec
                .run("check_status job-1", move || {
                    c.fetch_add(1, Ordering::SeqCst);
                    async { Err(RemoteError::transport(TransportKind::ConnectionReset, "reset")) }
                })
                .await;

            assert!(matches!(res, Err(RemoteError::Transport { .. })));
            assert_eq!(calls.load(Ordering::SeqCst), k + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_follow_backoff_bounds() {
        let exec = RetryExecutor::new(fast_policy(2));
        let started = Instant::now();

        let _: Result<(), _> = exec
            .run("submit", || async { Err(RemoteError::status(429, "slow down")) })
            .await;

        // 10ms + 20ms of base delay, each with up to 200ms of jitter.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(430), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_published() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let exec = RetryExecutor::new(fast_policy(1)).with_bus(bus);

        let _: Result<(), _> = exec
            .run("continue_job job-9", || async {
                Err(RemoteError::NoResponse {
                    message: "socket hang up".into(),
                })
            })
            .await;

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::RetryScheduled);
        assert_eq!(ev.job.as_deref(), Some("continue_job job-9"));
        assert_eq!(ev.attempt, Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrapped_operation_retries_on_every_call() {
        let exec = RetryExecutor::new(fast_policy(1));
        let calls = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&calls);
        let op = exec.wrap("flaky", move || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                    Err(RemoteError::status(502, "bad gateway"))
                } else {
                    Ok(())
                }
            }
        });

        assert!(op().await.is_ok());
        assert!(op().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
