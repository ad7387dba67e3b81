//! # Orchestrator: the caller-facing API.
//!
//! The [`Orchestrator`] owns the event bus, a [`SubscriberSet`], the task cache and
//! the three engines (retry executor, status poller, continuation coordinator).
//!
//! ## High-level architecture
//! ```text
//! generate_and_wait(params)
//!   └─► coordinator.submit(params) ──► remote.submit (retried) ──► cache.set(entry)
//!   └─► poller.poll_until_complete(job_id, EntryChecker)
//!          loop:
//!            check       = remote.check_status        (retried)
//!            after_check = coordinator.on_poll_result (continuation at most once,
//!                                                      cleanup on terminal status)
//!   └─► Completed → Ok(items) | Failed → Err(JobFailed) | poll error → Err(..)
//!
//! Event flow:
//!   retry / poller / coordinator / cache sweeper ── publish ──► Bus ──► listener
//!        ──► SubscriberSet::emit(&Event) ──► [queue S1] … [queue SN]
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use jobvisor::{
//!     Config, GenerationParams, JobId, JobStatus, Orchestrator, OutputItem, RemoteError,
//!     RemoteGenerationApi, RequestSnapshot, Submission,
//! };
//!
//! struct Ready;
//!
//! #[async_trait]
//! impl RemoteGenerationApi for Ready {
//!     async fn submit(&self, _p: &GenerationParams) -> Result<Submission, RemoteError> {
//!         Ok(Submission { job_id: JobId::new("job-1"), uploaded_resources: vec![], snapshot: RequestSnapshot::default() })
//!     }
//!     async fn check_status(&self, _id: &JobId) -> Result<JobStatus, RemoteError> {
//!         Ok(JobStatus::completed(vec![OutputItem::new("https://cdn.example/1.png")]))
//!     }
//!     async fn continue_job(&self, _id: &JobId, _s: &RequestSnapshot) -> Result<(), RemoteError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(Config::default(), Arc::new(Ready));
//!     let items = orchestrator
//!         .generate_and_wait(GenerationParams::new("a red fox", 1, "v3"))
//!         .await?;
//!     assert_eq!(items.len(), 1);
//!     orchestrator.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::builder::OrchestratorBuilder;
use crate::cache::{TaskCache, TaskEntry};
use crate::core::{Config, ContinuationCoordinator, RetryExecutor, StatusChecker, StatusPoller};
use crate::error::{OrchestratorError, RemoteError};
use crate::events::Bus;
use crate::remote::{GenerationParams, JobId, JobState, JobStatus, OutputItem, RemoteGenerationApi};
use crate::subscribers::SubscriberSet;

/// Submits jobs, polls them to completion and coordinates continuations.
pub struct Orchestrator {
    cfg: Config,
    bus: Bus,
    listener_token: CancellationToken,
    listener: JoinHandle<()>,
    _stop_listener_on_drop: DropGuard,
    remote: Arc<dyn RemoteGenerationApi>,
    retry: RetryExecutor,
    poller: StatusPoller,
    coordinator: ContinuationCoordinator,
}

impl Orchestrator {
    /// Creates an orchestrator without subscribers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(cfg: Config, remote: Arc<dyn RemoteGenerationApi>) -> Self {
        Self::builder(cfg).build(remote)
    }

    /// Returns a builder for an orchestrator with subscribers or a shared cache.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: SubscriberSet,
        listener_token: CancellationToken,
        remote: Arc<dyn RemoteGenerationApi>,
        retry: RetryExecutor,
        poller: StatusPoller,
        coordinator: ContinuationCoordinator,
    ) -> Self {
        let listener = subscriber_listener(&bus, subs, listener_token.clone());
        Self {
            cfg,
            bus,
            _stop_listener_on_drop: listener_token.clone().drop_guard(),
            listener_token,
            listener,
            remote,
            retry,
            poller,
            coordinator,
        }
    }

    /// Submits a job and returns its id without waiting.
    pub async fn submit_job(&self, params: GenerationParams) -> Result<JobId, OrchestratorError> {
        validate_params(&params)?;
        let entry = self.coordinator.submit(params).await?;
        Ok(entry.id().clone())
    }

    /// Performs one status check of `job_id` (no polling loop).
    ///
    /// If the job is still cached, the result is routed through the continuation
    /// coordinator, so this call may trigger the continuation or clean the entry up.
    pub async fn get_result(&self, job_id: &str) -> Result<JobStatus, OrchestratorError> {
        if job_id.trim().is_empty() {
            return Err(OrchestratorError::Validation {
                reason: "job id must not be empty".to_string(),
            });
        }

        let id = JobId::new(job_id);
        let context = format!("check_status {id}");
        let status = self
            .retry
            .run(&context, || self.remote.check_status(&id))
            .await?;

        match self.coordinator.cache().get(job_id) {
            Some(entry) => Ok(self.coordinator.on_poll_result(&entry, status).await?),
            None => Ok(status),
        }
    }

    /// Checks several jobs concurrently.
    ///
    /// A job whose check fails is reported as a `Failed` status carrying the
    /// error text; one bad id never fails the whole batch.
    pub async fn get_batch_results(&self, job_ids: &[JobId]) -> Vec<(JobId, JobStatus)> {
        let checks = job_ids.iter().map(|id| async move {
            let status = match self.get_result(id.as_str()).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::debug!(job = id.as_str(), err = %e, "batch check failed");
                    JobStatus::failed(e.to_string())
                }
            };
            (id.clone(), status)
        });
        futures::future::join_all(checks).await
    }

    /// Submits a job and polls it until it finishes.
    ///
    /// # Errors
    /// - [`OrchestratorError::JobFailed`] when the remote reports the job as failed;
    /// - [`OrchestratorError::Timeout`] when the poll budget runs out;
    /// - [`OrchestratorError::Remote`] when a remote call fails for good.
    pub async fn generate_and_wait(&self, params: GenerationParams) -> Result<Vec<OutputItem>, OrchestratorError> {
        self.generate_and_wait_with_cancel(params, &CancellationToken::new())
            .await
    }

    /// Same as [`generate_and_wait`](Self::generate_and_wait), but gives up with
    /// [`OrchestratorError::Canceled`] once `token` is cancelled.
    pub async fn generate_and_wait_with_cancel(
        &self,
        params: GenerationParams,
        token: &CancellationToken,
    ) -> Result<Vec<OutputItem>, OrchestratorError> {
        validate_params(&params)?;
        let entry = self.coordinator.submit(params).await?;
        let job_id = entry.id().clone();

        let checker = EntryChecker {
            remote: Arc::clone(&self.remote),
            coordinator: &self.coordinator,
            entry,
        };
        let status = self
            .poller
            .poll_until_complete_with_cancel(job_id.as_str(), &checker, token)
            .await
            .map_err(|e| OrchestratorError::from_poll(job_id.as_str(), e))?;

        match status.state {
            JobState::Failed => Err(OrchestratorError::JobFailed {
                job_id: job_id.to_string(),
                reason: status.error.unwrap_or_else(|| "unknown error".to_string()),
            }),
            _ => Ok(status.output_items),
        }
    }

    /// The task cache.
    pub fn cache(&self) -> &TaskCache {
        self.coordinator.cache()
    }

    /// The event bus; subscribe to it for raw events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Stops the cache sweeper and drains subscriber queues.
    pub async fn shutdown(self) {
        self.coordinator.cache().close();
        self.listener_token.cancel();
        let _ = self.listener.await;
    }
}

/// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
///
/// On cancellation it forwards what is still buffered, then shuts the set down.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        while let Ok(ev) = rx.try_recv() {
            set.emit(&ev);
        }
        set.shutdown().await;
    })
}

fn validate_params(params: &GenerationParams) -> Result<(), OrchestratorError> {
    if params.prompt.trim().is_empty() {
        return Err(OrchestratorError::Validation {
            reason: "prompt must not be empty".to_string(),
        });
    }
    if params.count == 0 {
        return Err(OrchestratorError::Validation {
            reason: "count must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Checks one cached job and feeds every result through the coordinator.
struct EntryChecker<'a> {
    remote: Arc<dyn RemoteGenerationApi>,
    coordinator: &'a ContinuationCoordinator,
    entry: Arc<TaskEntry>,
}

#[async_trait]
impl<'a> StatusChecker for EntryChecker<'a> {
    async fn check(&self, job_id: &JobId) -> Result<JobStatus, RemoteError> {
        self.remote.check_status(job_id).await
    }

    async fn after_check(&self, _job_id: &JobId, status: JobStatus) -> Result<JobStatus, RemoteError> {
        self.coordinator.on_poll_result(&self.entry, status).await
    }
}
