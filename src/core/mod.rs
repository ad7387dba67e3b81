//! # Orchestration engines.
//!
//! - [`RetryExecutor`] bounded, classified retries of single remote calls;
//! - [`StatusPoller`] adaptive polling under an absolute timeout;
//! - [`ContinuationCoordinator`] exactly-once continuation and cache cleanup;
//! - [`Orchestrator`] the caller-facing API wiring them together.
//!
//! ```text
//! Orchestrator ──► ContinuationCoordinator ──► TaskCache
//!      │                    │
//!      └──► StatusPoller ───┴──► RetryExecutor ──► RemoteGenerationApi
//! ```

mod builder;
mod checker;
mod config;
mod coordinator;
mod orchestrator;
mod poller;
mod retry;

pub use builder::OrchestratorBuilder;
pub use checker::{CheckerFn, StatusChecker};
pub use config::Config;
pub use coordinator::{ContinuationCoordinator, ContinuationDecision};
pub use orchestrator::Orchestrator;
pub use poller::{PollConfig, StatusPoller};
pub use retry::RetryExecutor;
