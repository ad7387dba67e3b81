//! # Event bus for broadcasting orchestrator events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from many poll loops, the retry executor, the
//! continuation coordinator and the cache sweeper.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                  Subscriber (one):
//!   poll loop 1 ──┐
//!   poll loop N ──┼────► Bus ───────► listener ────► SubscriberSet
//!   retry       ──┤  (broadcast chan)  (in Orchestrator)
//!   sweeper     ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks and never fails.
//! - **Bounded capacity**: slow receivers get `RecvError::Lagged(n)` and skip `n` items.
//! - **No persistence**: events are dropped when nobody subscribes.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// Without receivers the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn test_receiver_sees_events_after_subscribe() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::JobSubmitted).with_job("early"));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::JobCompleted).with_job("late"));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::JobCompleted);
        assert_eq!(ev.job.as_deref(), Some("late"));
    }
}
