//! # Continuation coordinator.
//!
//! Some jobs request more outputs than the remote service produces per submission.
//! The service then reports `needs_continuation`, and exactly one follow-up
//! submission extends the job to its requested size.
//!
//! ## Per-job state machine
//! ```text
//! Submitted ──► PartialComplete{needs_continuation} ──► ContinuationTriggered ──► FullyComplete
//!     └────────────────────────────────────────────────────────────────────────► FullyComplete
//! ```
//!
//! ## Rules
//! - The decision step is a single compare-and-swap on the entry's flag: among any
//!   number of concurrent observers exactly one gets [`ContinuationDecision::Submit`].
//! - A failed continuation is returned to the caller and the flag stays set.
//! - A failed job never gets a continuation.
//! - A terminal status removes the entry from the cache, unless a newer entry
//!   already replaced it under the same id.

use std::sync::Arc;

use crate::cache::{EntryState, TaskCache, TaskEntry, TaskFields};
use crate::core::retry::RetryExecutor;
use crate::error::RemoteError;
use crate::events::{Bus, Event, EventKind};
use crate::remote::{GenerationParams, JobState, JobStatus, RemoteGenerationApi, Submission};

/// Outcome of the atomic decision step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContinuationDecision {
    /// This caller won the flag and must issue the continuation.
    Submit,
    /// The continuation was already claimed by someone else.
    AlreadySent,
    /// The status does not ask for a continuation.
    NotNeeded,
}

/// Decides and issues continuations; owns entry cleanup on terminal status.
#[derive(Clone)]
pub struct ContinuationCoordinator {
    cache: TaskCache,
    remote: Arc<dyn RemoteGenerationApi>,
    retry: RetryExecutor,
    bus: Option<Bus>,
    output_cap: Option<usize>,
}

impl ContinuationCoordinator {
    /// Creates a coordinator over `cache` and `remote`.
    pub fn new(cache: TaskCache, remote: Arc<dyn RemoteGenerationApi>, retry: RetryExecutor) -> Self {
        Self {
            cache,
            remote,
            retry,
            bus: None,
            output_cap: None,
        }
    }

    /// Publishes continuation and lifecycle events on `bus`.
    #[must_use]
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Sets the remote's per-submission output cap (`None` = no cap).
    ///
    /// With a cap, a `Completed` status still short of the requested count after
    /// the continuation was sent is treated as outstanding.
    #[must_use]
    pub fn with_output_cap(mut self, cap: Option<usize>) -> Self {
        self.output_cap = cap;
        self
    }

    /// The cache this coordinator maintains.
    pub fn cache(&self) -> &TaskCache {
        &self.cache
    }

    /// Submits `params` and caches the resulting entry.
    pub async fn submit(&self, params: GenerationParams) -> Result<Arc<TaskEntry>, RemoteError> {
        let remote = Arc::clone(&self.remote);
        let submission: Submission = self
            .retry
            .run("submit", || remote.submit(&params))
            .await?;

        let requested = params.count as usize;
        let Submission {
            job_id,
            uploaded_resources,
            snapshot,
        } = submission;
        tracing::info!(job = %job_id, requested, "job submitted");
        self.publish(|| {
            Event::new(EventKind::JobSubmitted)
                .with_job(job_id.as_str())
                .with_items(requested)
        });

        Ok(self
            .cache
            .set(job_id, TaskFields::new(params, uploaded_resources, snapshot)))
    }

    /// The atomic decision step.
    pub fn decide(&self, entry: &TaskEntry, result: &JobStatus) -> ContinuationDecision {
        if !result.needs_continuation || result.state == JobState::Failed {
            return ContinuationDecision::NotNeeded;
        }
        if entry.try_claim_continuation() {
            ContinuationDecision::Submit
        } else {
            ContinuationDecision::AlreadySent
        }
    }

    /// Applies one status observation to `entry`.
    ///
    /// Issues the continuation when this call wins the decision, updates the
    /// entry's state, and cleans the entry up once the job is terminal.
    pub async fn on_poll_result(&self, entry: &TaskEntry, result: JobStatus) -> Result<JobStatus, RemoteError> {
        let mut result = self.hold_short_completion(entry, result);

        if self.decide(entry, &result) == ContinuationDecision::Submit {
            self.continue_job(entry, &result).await?;
            let total = entry.params().count;
            result.message = Some(format!(
                "{}/{} outputs ready, generating the rest; query again for the full result",
                result.output_items.len(),
                total
            ));
        }

        if result.is_terminal() {
            entry.set_state(EntryState::Completed);
            self.finish(entry, &result);
        } else {
            entry.set_state(EntryState::Active);
        }
        Ok(result)
    }

    /// Removes the entry for `job_id`; returns whether one existed.
    pub fn cleanup(&self, job_id: &str) -> bool {
        self.cache.cleanup(job_id)
    }

    async fn continue_job(&self, entry: &TaskEntry, seen: &JobStatus) -> Result<(), RemoteError> {
        let job_id = entry.id().as_str();
        let items = seen.output_items.len();
        tracing::info!(job = job_id, items, requested = entry.params().count, "triggering continuation");
        self.publish(|| {
            Event::new(EventKind::ContinuationTriggered)
                .with_job(job_id)
                .with_items(items)
        });

        let context = format!("continue_job {job_id}");
        let remote = Arc::clone(&self.remote);
        let res = self
            .retry
            .run(&context, || remote.continue_job(entry.id(), entry.snapshot()))
            .await;

        if let Err(e) = &res {
            tracing::error!(job = job_id, err = %e, "continuation failed, it will not be retried");
            self.publish(|| {
                Event::new(EventKind::ContinuationFailed)
                    .with_job(job_id)
                    .with_reason(e.to_string())
            });
        }
        res
    }

    /// After the continuation was sent, a short `Completed` is not final yet.
    fn hold_short_completion(&self, entry: &TaskEntry, mut result: JobStatus) -> JobStatus {
        let Some(cap) = self.output_cap else {
            return result;
        };
        let requested = entry.params().count as usize;
        if result.state == JobState::Completed
            && !result.needs_continuation
            && requested > cap
            && entry.continuation_sent()
            && result.output_items.len() < requested
        {
            tracing::debug!(
                job = entry.id().as_str(),
                items = result.output_items.len(),
                requested,
                "completed below requested count, waiting for continuation output"
            );
            result.needs_continuation = true;
        }
        result
    }

    fn finish(&self, entry: &TaskEntry, result: &JobStatus) {
        let job_id = entry.id().as_str();
        if !self.cache.cleanup_entry(entry) {
            tracing::debug!(job = job_id, "entry already gone or replaced, nothing to clean up");
        }
        match result.state {
            JobState::Failed => {
                let reason = result.error.as_deref().unwrap_or("unknown error");
                tracing::warn!(job = job_id, err = reason, "job failed");
                self.publish(|| {
                    Event::new(EventKind::JobFailed)
                        .with_job(job_id)
                        .with_reason(reason)
                });
            }
            _ => {
                tracing::info!(job = job_id, items = result.output_items.len(), "job completed");
                self.publish(|| {
                    Event::new(EventKind::JobCompleted)
                        .with_job(job_id)
                        .with_items(result.output_items.len())
                });
            }
        }
    }

    fn publish(&self, ev: impl FnOnce() -> Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev());
        }
    }
}

impl std::fmt::Debug for ContinuationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinuationCoordinator")
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("output_cap", &self.output_cap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::policies::RetryPolicy;
    use crate::remote::{JobId, OutputItem, RequestSnapshot};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Remote {
        continuations: AtomicU32,
        fail_continuation: bool,
    }

    #[async_trait]
    impl RemoteGenerationApi for Remote {
        async fn submit(&self, _params: &GenerationParams) -> Result<Submission, RemoteError> {
            Ok(Submission {
                job_id: JobId::new("job-1"),
                uploaded_resources: Vec::new(),
                snapshot: RequestSnapshot {
                    submit_id: "sub-1".into(),
                    ..RequestSnapshot::default()
                },
            })
        }

        async fn check_status(&self, _job_id: &JobId) -> Result<JobStatus, RemoteError> {
            Ok(JobStatus::from_counts(0, 6))
        }

        async fn continue_job(&self, _job_id: &JobId, snapshot: &RequestSnapshot) -> Result<(), RemoteError> {
            assert_eq!(snapshot.submit_id, "sub-1");
            self.continuations.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_continuation {
                Err(RemoteError::status(400, "draft expired"))
            } else {
                Ok(())
            }
        }
    }

    fn items(n: usize) -> Vec<OutputItem> {
        (0..n).map(|i| OutputItem::new(format!("https://cdn.example/{i}.png"))).collect()
    }

    fn coordinator(remote: Arc<Remote>) -> ContinuationCoordinator {
        ContinuationCoordinator::new(
            TaskCache::new(CacheConfig::default()),
            remote,
            RetryExecutor::new(RetryPolicy::none()),
        )
        .with_output_cap(Some(4))
    }

    #[tokio::test]
    async fn test_concurrent_observers_trigger_one_continuation() {
        let remote = Arc::new(Remote::default());
        let coord = coordinator(Arc::clone(&remote));
        let entry = coord
            .submit(GenerationParams::new("six foxes", 6, "v3"))
            .await
            .unwrap();

        let partial = JobStatus::completed(items(4)).with_continuation();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let coord = coord.clone();
                let entry = Arc::clone(&entry);
                let status = partial.clone();
                tokio::spawn(async move { coord.on_poll_result(&entry, status).await })
            })
            .collect();

        for res in futures::future::join_all(handles).await {
            let status = res.unwrap().unwrap();
            assert!(!status.is_terminal());
        }
        assert_eq!(remote.continuations.load(Ordering::SeqCst), 1);
        assert!(entry.continuation_sent());
    }

    #[tokio::test]
    async fn test_decision_step_has_one_winner() {
        let coord = coordinator(Arc::new(Remote::default()));
        let entry = coord
            .submit(GenerationParams::new("six foxes", 6, "v3"))
            .await
            .unwrap();
        let partial = JobStatus::completed(items(4)).with_continuation();

        let decisions: Vec<_> = (0..10).map(|_| coord.decide(&entry, &partial)).collect();

        let submits = decisions.iter().filter(|d| **d == ContinuationDecision::Submit).count();
        let already = decisions
            .iter()
            .filter(|d| **d == ContinuationDecision::AlreadySent)
            .count();
        assert_eq!((submits, already), (1, 9));
        assert_eq!(
            coord.decide(&entry, &JobStatus::completed(items(6))),
            ContinuationDecision::NotNeeded
        );
    }

    #[tokio::test]
    async fn test_partial_then_full_result_cleans_up() {
        let remote = Arc::new(Remote::default());
        let coord = coordinator(Arc::clone(&remote));
        let entry = coord
            .submit(GenerationParams::new("six foxes", 6, "v3"))
            .await
            .unwrap();

        let first = coord
            .on_poll_result(&entry, JobStatus::completed(items(4)).with_continuation())
            .await
            .unwrap();
        assert!(first.message.as_deref().unwrap_or_default().starts_with("4/6"));
        assert_eq!(entry.state(), EntryState::Active);
        assert!(coord.cache().has("job-1"));

        let last = coord
            .on_poll_result(&entry, JobStatus::completed(items(6)))
            .await
            .unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.output_items.len(), 6);
        assert_eq!(entry.state(), EntryState::Completed);
        assert!(!coord.cache().has("job-1"));
        assert_eq!(remote.continuations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_completion_after_continuation_keeps_polling() {
        let coord = coordinator(Arc::new(Remote::default()));
        let entry = coord
            .submit(GenerationParams::new("six foxes", 6, "v3"))
            .await
            .unwrap();

        coord
            .on_poll_result(&entry, JobStatus::completed(items(4)).with_continuation())
            .await
            .unwrap();
        let status = coord
            .on_poll_result(&entry, JobStatus::completed(items(4)))
            .await
            .unwrap();

        assert!(status.needs_continuation);
        assert!(!status.is_terminal());
        assert!(coord.cache().has("job-1"));
    }

    #[tokio::test]
    async fn test_failed_continuation_propagates_and_stays_claimed() {
        let remote = Arc::new(Remote {
            fail_continuation: true,
            ..Remote::default()
        });
        let coord = coordinator(Arc::clone(&remote));
        let entry = coord
            .submit(GenerationParams::new("six foxes", 6, "v3"))
            .await
            .unwrap();
        let partial = JobStatus::completed(items(4)).with_continuation();

        let err = coord.on_poll_result(&entry, partial.clone()).await.unwrap_err();
        assert_eq!(err, RemoteError::status(400, "draft expired"));
        assert!(entry.continuation_sent());

        // A later observer must not submit again.
        coord.on_poll_result(&entry, partial).await.unwrap();
        assert_eq!(remote.continuations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_job_is_cleaned_up() {
        let coord = coordinator(Arc::new(Remote::default()));
        let entry = coord
            .submit(GenerationParams::new("a fox", 1, "v3"))
            .await
            .unwrap();

        let status = coord
            .on_poll_result(&entry, JobStatus::failed("content policy violation"))
            .await
            .unwrap();

        assert_eq!(status.state, JobState::Failed);
        assert!(!coord.cache().has("job-1"));
    }

    #[tokio::test]
    async fn test_failed_status_never_triggers_continuation() {
        let remote = Arc::new(Remote::default());
        let coord = coordinator(Arc::clone(&remote));
        let entry = coord
            .submit(GenerationParams::new("six foxes", 6, "v3"))
            .await
            .unwrap();
        let failed = JobStatus::failed("boom").with_continuation();

        assert_eq!(coord.decide(&entry, &failed), ContinuationDecision::NotNeeded);
        let status = coord.on_poll_result(&entry, failed).await.unwrap();

        assert_eq!(status.state, JobState::Failed);
        assert_eq!(remote.continuations.load(Ordering::SeqCst), 0);
        assert!(!entry.continuation_sent());
        assert!(!coord.cache().has("job-1"));
    }

    #[tokio::test]
    async fn test_finishing_a_replaced_entry_keeps_the_new_one() {
        let coord = coordinator(Arc::new(Remote::default()));
        let old = coord
            .submit(GenerationParams::new("a fox", 1, "v3"))
            .await
            .unwrap();
        let new = coord
            .submit(GenerationParams::new("a fox", 1, "v3"))
            .await
            .unwrap();
        assert_eq!(old.id(), new.id());

        let status = coord
            .on_poll_result(&old, JobStatus::completed(items(1)))
            .await
            .unwrap();

        assert!(status.is_terminal());
        let cached = coord.cache().get("job-1").expect("replacement must stay cached");
        assert!(Arc::ptr_eq(&cached, &new));
    }
}
