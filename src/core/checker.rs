//! # Status checkers driven by the poller.
//!
//! A [`StatusChecker`] performs one status observation of a job. The poller runs
//! [`check`](StatusChecker::check) through the retry executor, then hands the
//! result to [`after_check`](StatusChecker::after_check) exactly once, outside the
//! retry loop. Side effects that must not be repeated (a continuation submission)
//! belong in `after_check`.
//!
//! [`CheckerFn`] adapts a closure for tests and ad-hoc polling.

use std::future::Future;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::remote::{JobId, JobStatus};

/// One status observation of a job.
#[async_trait]
pub trait StatusChecker: Send + Sync {
    /// Reads the job's status. May be retried.
    async fn check(&self, job_id: &JobId) -> Result<JobStatus, RemoteError>;

    /// Post-processes a successful check. Never retried.
    async fn after_check(&self, _job_id: &JobId, status: JobStatus) -> Result<JobStatus, RemoteError> {
        Ok(status)
    }
}

/// Closure-backed checker.
///
/// Wraps a closure that creates a new future per check.
///
/// ## Example
/// ```rust
/// use jobvisor::{CheckerFn, JobId, JobStatus, RemoteError};
///
/// let checker = CheckerFn::new(|_id: JobId| async { Ok::<_, RemoteError>(JobStatus::from_counts(1, 4)) });
/// # let _ = checker;
/// ```
#[derive(Debug)]
pub struct CheckerFn<F> {
    f: F,
}

impl<F> CheckerFn<F> {
    /// Creates a new closure-backed checker.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> StatusChecker for CheckerFn<F>
where
    F: Fn(JobId) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<JobStatus, RemoteError>> + Send + 'static,
{
    async fn check(&self, job_id: &JobId) -> Result<JobStatus, RemoteError> {
        (self.f)(job_id.clone()).await
    }
}
