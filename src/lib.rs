//! # jobvisor
//!
//! **Jobvisor** is a local orchestration layer for long-running jobs executed by a
//! remote generation service that must be polled for completion.
//!
//! It tracks in-flight jobs, polls them with adaptive backoff under a wall-clock
//! timeout, issues the single follow-up ("continuation") submission a partial
//! result needs, and reclaims memory of finished or abandoned jobs.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                 caller
//!                   │ submit_job / get_result / generate_and_wait / get_batch_results
//!                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - StatusPoller            (interval × 1.5 up to max, timeout)    │
//! │  - ContinuationCoordinator (CAS on continuation_sent, cleanup)    │
//! │  - RetryExecutor           (classified retries, backoff+jitter)   │
//! │  - TaskCache               (DashMap, TTL, lazy expiry, sweeper)   │
//! └──────┬───────────────────────────┬───────────────────────┬────────┘
//!        │ submit / check_status /   │ publish(Event)        │
//!        │ continue_job              ▼                       │
//!        ▼                  ┌──────────────────┐             │
//!  RemoteGenerationApi      │ Bus (broadcast)  │◄── sweeper ─┘
//!  (transport layer)        └────────┬─────────┘
//!                                    ▼
//!                         subscriber_listener ──► SubscriberSet
//!                                               ┌──────┼──────┐
//!                                               ▼      ▼      ▼
//!                                            worker1 worker2 workerN
//! ```
//!
//! ### Lifecycle of one job
//! ```text
//! submit ──► cache.set(entry) ──► check ──► terminal? ──yes──► cleanup ──► items | JobFailed
//!                                   ▲          │ no
//!                                   │          ├─ needs_continuation & CAS won ─► continue_job (once)
//!                                   └─ sleep ◄─┘  elapsed + next > timeout ─► Timeout
//! ```
//!
//! ## Features
//! | Area              | Description                                                    |
//! |-------------------|----------------------------------------------------------------|
//! | **Cache**         | Injectable TTL store with lazy expiry and a cancellable sweeper |
//! | **Retries**       | Closed error kinds, default classifier, exponential backoff    |
//! | **Polling**       | Immediate first check, growing intervals, absolute timeout     |
//! | **Continuations** | At most one per job under any number of concurrent observers   |
//! | **Observability** | Events on a broadcast bus, fan-out to subscribers              |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.

mod cache;
mod core;
mod error;
mod events;
mod policies;
mod remote;
mod subscribers;

// ---- Public re-exports ----

pub use cache::{CacheConfig, CacheStats, EntryState, TaskCache, TaskEntry, TaskFields};
pub use self::core::{
    CheckerFn, Config, ContinuationCoordinator, ContinuationDecision, Orchestrator,
    OrchestratorBuilder, PollConfig, RetryExecutor, StatusChecker, StatusPoller,
};
pub use error::{format_duration, OrchestratorError, PollError, RemoteError, TransportKind};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, Classifier, JitterPolicy, RetryPolicy};
pub use remote::{
    progress_percent, GenerationParams, JobId, JobState, JobStatus, OutputItem,
    RemoteGenerationApi, RequestSnapshot, ResourceRef, Submission,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
