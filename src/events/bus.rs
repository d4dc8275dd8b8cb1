//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from multiple sources (producers, engines,
//! machines, commands).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                    Subscribers (many):
//!   ItemProducer ──┐                 ┌──► controller funnel
//!   TaskEngine   ──┼────► Bus ───────┼──► state-machine listener
//!   StateMachine ──┤  (broadcast)    └──► ObserverSet pump
//!   Command      ──┘
//! ```
//!
//! Each engine owns one bus shared with its internal producers; a controller
//! owns its own bus and subscribes to the buses of the engines registered
//! with it.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: a single ring buffer stores recent events for all
//!   receivers; the minimum capacity is 1 (clamped).
//! - **Lag handling**: slow receivers observe `RecvError::Lagged(n)` and skip
//!   the `n` oldest items.
//! - **No persistence**: events are lost if there are no active subscribers
//!   at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender); every component
/// that needs to publish holds its own clone.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no receivers, the event is dropped; the call still
    /// returns immediately.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes subsequent events.
    ///
    /// Each call creates an **independent** receiver; a receiver only gets
    /// events sent after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Publishes a borrowed event by cloning it.
    pub fn publish_ref(&self, ev: &Event) {
        let _ = self.tx.send(ev.clone());
    }
}
