//! # Status poller: adaptive polling under an absolute timeout.
//!
//! [`StatusPoller`] repeatedly checks a job until it reaches a terminal status.
//!
//! ## Loop
//! ```text
//! validate(job_id) ─► started = now
//! loop:
//!   check  (through RetryExecutor) ─► publish(StatusChecked) ─► after_check
//!   terminal? ──────────────────────────────────────► return Ok(status)
//!   next = min(initial × factor^n, max_interval)
//!   elapsed + next > timeout? ─► publish(TimeoutHit) ► return Err(Timeout{elapsed})
//!   publish(PollScheduled)
//!   select! { sleep(next), token.cancelled() ─► publish(PollCanceled) ► Err(Canceled) }
//! ```
//!
//! ## Rules
//! - The first check happens immediately; a terminal first result never sleeps.
//! - A remote `Failed` status is returned as data, not as an error.
//! - The timeout is measured from loop start and checked before each sleep.
//! - Results of one job are observed in the order checks were issued.
//! - `StatusChecked` carries the raw check result and precedes anything `after_check` publishes.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::checker::StatusChecker;
use crate::core::retry::RetryExecutor;
use crate::error::PollError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffPolicy, JitterPolicy};
use crate::remote::{JobId, JobStatus};

/// Status polling settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PollConfig {
    /// Delay before the second check.
    pub initial_interval: Duration,
    /// Upper bound of the delay between checks.
    pub max_interval: Duration,
    /// Growth factor applied to the delay after every check.
    pub backoff_factor: f64,
    /// Absolute polling budget measured from loop start.
    pub timeout: Duration,
}

impl PollConfig {
    /// Interval growth as a jitter-free [`BackoffPolicy`].
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            first: self.initial_interval,
            max: self.max_interval,
            factor: self.backoff_factor,
            jitter: JitterPolicy::None,
        }
    }
}

impl Default for PollConfig {
    /// `initial_interval = 2s`, `max_interval = 10s`, `backoff_factor = 1.5`, `timeout = 600s`.
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(10),
            backoff_factor: 1.5,
            timeout: Duration::from_secs(600),
        }
    }
}

/// Drives status checks for one job at a time; share it across loops freely.
#[derive(Clone, Debug)]
pub struct StatusPoller {
    cfg: PollConfig,
    retry: RetryExecutor,
    bus: Option<Bus>,
}

impl StatusPoller {
    /// Creates a poller that runs each check through `retry`.
    pub fn new(cfg: PollConfig, retry: RetryExecutor) -> Self {
        Self {
            cfg,
            retry,
            bus: None,
        }
    }

    /// Publishes polling events on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &PollConfig {
        &self.cfg
    }

    /// Polls `job_id` until it reaches a terminal status or the timeout elapses.
    pub async fn poll_until_complete<C>(&self, job_id: &str, checker: &C) -> Result<JobStatus, PollError>
    where
        C: StatusChecker + ?Sized,
    {
        self.poll_until_complete_with_cancel(job_id, checker, &CancellationToken::new())
            .await
    }

    /// Same as [`poll_until_complete`](Self::poll_until_complete), but stops at the
    /// next sleep once `token` is cancelled.
    pub async fn poll_until_complete_with_cancel<C>(
        &self,
        job_id: &str,
        checker: &C,
        token: &CancellationToken,
    ) -> Result<JobStatus, PollError>
    where
        C: StatusChecker + ?Sized,
    {
        if job_id.trim().is_empty() {
            return Err(PollError::Validation {
                reason: "job id must not be empty".to_string(),
            });
        }

        let id = JobId::new(job_id);
        let context = format!("check_status {id}");
        let intervals = self.cfg.backoff();
        let started = Instant::now();
        let mut check: u32 = 0;

        loop {
            if token.is_cancelled() {
                return Err(self.canceled(job_id));
            }

            check = check.saturating_add(1);
            let status = self.retry.run(&context, || checker.check(&id)).await?;
            self.publish(|| {
                Event::new(EventKind::StatusChecked)
                    .with_job(job_id)
                    .with_attempt(check)
                    .with_items(status.output_items.len())
                    .with_reason(status.state.as_str())
            });
            let status = checker.after_check(&id, status).await?;

            if status.is_terminal() {
                return Ok(status);
            }

            let next = intervals.next(check - 1);
            let elapsed = started.elapsed();
            if elapsed + next > self.cfg.timeout {
                tracing::warn!(job = job_id, checks = check, elapsed_ms = elapsed.as_millis() as u64, "polling timed out");
                self.publish(|| {
                    Event::new(EventKind::TimeoutHit)
                        .with_job(job_id)
                        .with_timeout(elapsed)
                });
                return Err(PollError::Timeout { elapsed });
            }

            self.publish(|| {
                Event::new(EventKind::PollScheduled)
                    .with_job(job_id)
                    .with_attempt(check)
                    .with_delay(next)
            });

            tokio::select! {
                _ = tokio::time::sleep(next) => {}
                _ = token.cancelled() => return Err(self.canceled(job_id)),
            }
        }
    }

    fn canceled(&self, job_id: &str) -> PollError {
        tracing::debug!(job = job_id, "polling cancelled");
        self.publish(|| Event::new(EventKind::PollCanceled).with_job(job_id));
        PollError::Canceled
    }

    fn publish(&self, ev: impl FnOnce() -> Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checker::CheckerFn;
    use crate::error::RemoteError;
    use crate::policies::RetryPolicy;
    use crate::remote::{JobState, OutputItem};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn poller() -> StatusPoller {
        StatusPoller::new(PollConfig::default(), RetryExecutor::new(RetryPolicy::none()))
    }

    fn counting<F>(calls: &Arc<AtomicU32>, f: F) -> impl StatusChecker
    where
        F: Fn(u32) -> Result<JobStatus, RemoteError> + Send + Sync + 'static,
    {
        let calls = Arc::clone(calls);
        let f = Arc::new(f);
        CheckerFn::new(move |_id: JobId| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let f = Arc::clone(&f);
            async move { f(n) }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_first_check_never_sleeps() {
        let calls = Arc::new(AtomicU32::new(0));
        let checker = counting(&calls, |_| Ok(JobStatus::completed(vec![OutputItem::new("u1")])));

        let started = Instant::now();
        let status = poller().poll_until_complete("job-1", &checker).await.unwrap();

        assert_eq!(status.state, JobState::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intervals_grow_between_checks() {
        let calls = Arc::new(AtomicU32::new(0));
        let checker = counting(&calls, |n| {
            if n < 2 {
                Ok(JobStatus::from_counts(n, 4))
            } else {
                Ok(JobStatus::completed(vec![]))
            }
        });

        let started = Instant::now();
        poller().poll_until_complete("job-1", &checker).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(5)); // 2s + 3s
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_pending_times_out() {
        let calls = Arc::new(AtomicU32::new(0));
        let checker = counting(&calls, |_| Ok(JobStatus::from_counts(0, 4)));

        let err = poller().poll_until_complete("job-1", &checker).await.unwrap_err();

        let PollError::Timeout { elapsed } = err else {
            panic!("expected timeout, got {err:?}");
        };
        assert!(elapsed <= Duration::from_secs(600));
        assert!(elapsed + Duration::from_secs(10) > Duration::from_secs(600));
        // 2 + 3 + 4.5 + 6.75 = 16.25s over the first 5 checks, then one check per 10s.
        assert_eq!(calls.load(Ordering::SeqCst), 63);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_job_id_is_rejected_without_checking() {
        let calls = Arc::new(AtomicU32::new(0));
        let checker = counting(&calls, |_| Ok(JobStatus::completed(vec![])));

        let err = poller().poll_until_complete("   ", &checker).await.unwrap_err();

        assert!(matches!(err, PollError::Validation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_is_data() {
        let calls = Arc::new(AtomicU32::new(0));
        let checker = counting(&calls, |_| Ok(JobStatus::failed("content policy violation")));

        let status = poller().poll_until_complete("job-1", &checker).await.unwrap();

        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("content policy violation"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checker_error_propagates_unchanged() {
        let calls = Arc::new(AtomicU32::new(0));
        let checker = counting(&calls, |_| Err(RemoteError::status(401, "token expired")));

        let err = poller().poll_until_complete("job-1", &checker).await.unwrap_err();

        assert_eq!(err, PollError::Remote(RemoteError::status(401, "token expired")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let checker = counting(&calls, |_| Ok(JobStatus::from_counts(0, 4)));
        let token = CancellationToken::new();

        let t = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            t.cancel();
        });

        let started = Instant::now();
        let err = poller()
            .poll_until_complete_with_cancel("job-1", &checker, &token)
            .await
            .unwrap_err();

        assert_eq!(err, PollError::Canceled);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checks_are_published_in_order() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let calls = Arc::new(AtomicU32::new(0));
        let checker = counting(&calls, |n| {
            if n == 0 {
                Ok(JobStatus::from_counts(2, 4))
            } else {
                Ok(JobStatus::completed(vec![]))
            }
        });

        poller()
            .with_bus(bus)
            .poll_until_complete("job-7", &checker)
            .await
            .unwrap();

        let kinds: Vec<(EventKind, Option<u32>)> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| (ev.kind, ev.attempt))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::StatusChecked, Some(1)),
                (EventKind::PollScheduled, Some(1)),
                (EventKind::StatusChecked, Some(2)),
            ]
        );
    }

    struct FinishingChecker {
        bus: Bus,
    }

    #[async_trait::async_trait]
    impl StatusChecker for FinishingChecker {
        async fn check(&self, _job_id: &JobId) -> Result<JobStatus, RemoteError> {
            Ok(JobStatus::completed(vec![OutputItem::new("u1")]))
        }

        async fn after_check(&self, job_id: &JobId, status: JobStatus) -> Result<JobStatus, RemoteError> {
            self.bus
                .publish(Event::new(EventKind::JobCompleted).with_job(job_id.as_str()));
            Ok(status)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_is_published_before_its_consequences() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let checker = FinishingChecker { bus: bus.clone() };

        poller()
            .with_bus(bus)
            .poll_until_complete("job-8", &checker)
            .await
            .unwrap();

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        assert_eq!(kinds, vec![EventKind::StatusChecked, EventKind::JobCompleted]);
    }
}
