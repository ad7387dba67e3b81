//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `StatusPoller`, `RetryExecutor`, `ContinuationCoordinator`,
//!   the `TaskCache` sweeper, `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the orchestrator's listener, which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
