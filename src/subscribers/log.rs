//! # LogWriter: renders events through `tracing`
//!
//! A small subscriber that turns incoming [`Event`]s into structured `tracing`
//! records under the `jobvisor::events` target. Install any `tracing` subscriber
//! (e.g. `tracing-subscriber`) in the host application to see them.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  jobvisor::events: job submitted job="h-123" requested=6
//! DEBUG jobvisor::events: status checked job="h-123" check=1 items=4 state="completed"
//! INFO  jobvisor::events: continuation triggered job="h-123" items=4
//! WARN  jobvisor::events: retry scheduled op="check_status h-123" attempt=1 delay_ms=1130 err="..."
//! INFO  jobvisor::events: job completed job="h-123" items=6
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let job = e.job.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::JobSubmitted => {
                tracing::info!(target: "jobvisor::events", job, requested = ?e.items, "job submitted");
            }
            EventKind::JobCompleted => {
                tracing::info!(target: "jobvisor::events", job, items = ?e.items, "job completed");
            }
            EventKind::JobFailed => {
                tracing::warn!(target: "jobvisor::events", job, err = reason, "job failed");
            }
            EventKind::StatusChecked => {
                tracing::debug!(target: "jobvisor::events", job, check = ?e.attempt, items = ?e.items, state = reason, "status checked");
            }
            EventKind::PollScheduled => {
                tracing::debug!(target: "jobvisor::events", job, after_check = ?e.attempt, delay_ms = ?e.delay_ms, "next check scheduled");
            }
            EventKind::TimeoutHit => {
                tracing::warn!(target: "jobvisor::events", job, elapsed_ms = ?e.timeout_ms, "polling timed out");
            }
            EventKind::PollCanceled => {
                tracing::info!(target: "jobvisor::events", job, "polling cancelled");
            }
            EventKind::RetryScheduled => {
                tracing::warn!(target: "jobvisor::events", op = job, attempt = ?e.attempt, delay_ms = ?e.delay_ms, err = reason, "retry scheduled");
            }
            EventKind::ContinuationTriggered => {
                tracing::info!(target: "jobvisor::events", job, items = ?e.items, "continuation triggered");
            }
            EventKind::ContinuationFailed => {
                tracing::error!(target: "jobvisor::events", job, err = reason, "continuation failed");
            }
            EventKind::EntriesEvicted => {
                tracing::debug!(target: "jobvisor::events", removed = ?e.items, "expired cache entries evicted");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "jobvisor::events", subscriber = job, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: "jobvisor::events", subscriber = job, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
