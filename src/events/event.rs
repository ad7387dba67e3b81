//! # Runtime events emitted by the orchestrator.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Job lifecycle**: submitted, completed, failed
//! - **Polling**: status checked, next check scheduled, timeout, cancellation
//! - **Remote calls**: retry scheduled, continuation triggered/failed
//! - **Housekeeping**: cache eviction, subscriber overflow/panic
//!
//! The [`Event`] struct carries metadata such as the job id, attempt number,
//! delays and item counts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Within one poll loop events are published in the order checks were issued.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use jobvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_job("job-42")
//!     .with_reason("remote responded with status 503")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(2100));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.job.as_deref(), Some("job-42"));
//! assert_eq!(ev.delay_ms, Some(2100));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Job lifecycle ===
    /// A job was accepted by the remote service and cached.
    ///
    /// Sets: `job`, `items` (requested count)
    JobSubmitted,

    /// A job reached `Completed` with all of its output.
    ///
    /// Sets: `job`, `items` (delivered count)
    JobCompleted,

    /// The remote service reported the job as failed.
    ///
    /// Sets: `job`, `reason`
    JobFailed,

    // === Polling ===
    /// One status check returned.
    ///
    /// Sets: `job`, `attempt` (check number, 1-based), `items`, `reason` (remote state)
    StatusChecked,

    /// The next status check was scheduled.
    ///
    /// Sets: `job`, `attempt` (check just made), `delay_ms`
    PollScheduled,

    /// The poll budget was exhausted.
    ///
    /// Sets: `job`, `timeout_ms` (elapsed)
    TimeoutHit,

    /// Polling stopped because its cancellation token fired.
    ///
    /// Sets: `job`
    PollCanceled,

    // === Remote calls ===
    /// A failed remote call will be retried.
    ///
    /// Sets: `job` (operation context), `attempt` (failed attempt), `delay_ms`, `reason`
    RetryScheduled,

    /// The single continuation submission for a job was issued.
    ///
    /// Sets: `job`, `items` (items seen when triggering)
    ContinuationTriggered,

    /// The continuation submission failed; the job will not be continued again.
    ///
    /// Sets: `job`, `reason`
    ContinuationFailed,

    // === Housekeeping ===
    /// The periodic sweep removed expired cache entries.
    ///
    /// Sets: `items` (removed count)
    EntriesEvicted,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `job` (subscriber name), `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `job` (subscriber name), `reason` (panic info)
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Job id (or operation context / subscriber name), if applicable.
    pub job: Option<Arc<str>>,
    /// Attempt or check number (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next attempt or check, in milliseconds.
    pub delay_ms: Option<u32>,
    /// Elapsed or configured timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Item count (requested, received, or removed, depending on kind).
    pub items: Option<usize>,
    /// Human-readable reason (errors, remote state, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            job: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            items: None,
            reason: None,
        }
    }

    /// Attaches a job id.
    #[inline]
    pub fn with_job(mut self, job: impl Into<Arc<str>>) -> Self {
        self.job = Some(job.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout or elapsed duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an item count.
    #[inline]
    pub fn with_items(mut self, n: usize) -> Self {
        self.items = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_job(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_job(subscriber)
            .with_reason(info)
    }

    /// True for events produced by the subscriber machinery itself.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::StatusChecked);
        let b = Event::new(EventKind::StatusChecked);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_is_saturated() {
        let ev = Event::new(EventKind::PollScheduled).with_delay(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_internal_events() {
        assert!(Event::subscriber_overflow("log", "full").is_internal());
        assert!(!Event::new(EventKind::JobCompleted).is_internal());
    }
}
