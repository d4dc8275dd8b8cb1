//! # Runtime events emitted by queues, engines, machines, and commands.
//!
//! The [`EventKind`] enum is the closed set of notifications that flow through
//! a [`Bus`](crate::events::Bus). Four families:
//! - **Queue events**: producer lifecycle and drain signaling
//!   (started, stopped, items-produced, items-consumed)
//! - **Engine events**: task-engine lifecycle and per-task failures
//! - **Machine events**: state-machine lifecycle and transitions
//! - **Command events**: command execution lifecycle
//!
//! The [`Event`] struct carries the metadata a trigger predicate needs to
//! match on: the source component's name (the "sender" half of every
//! trigger), an optional error, transition states, queue depth, and a
//! command name.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! observed out of order across buses.
//!
//! ## Example
//! ```rust
//! use conveyor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::EngineStopped)
//!     .with_source("ingest")
//!     .with_error("disk full");
//!
//! assert_eq!(ev.kind, EventKind::EngineStopped);
//! assert_eq!(ev.source.as_deref(), Some("ingest"));
//! assert_eq!(ev.error.as_deref(), Some("disk full"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Queue events ===
    /// A producer's busy run began (first item entered an empty queue).
    ///
    /// Sets:
    /// - `source`: producer name
    /// - `at` / `seq`
    ProducerStarted,

    /// A producer's busy run ended, or the producer aborted.
    ///
    /// Sets:
    /// - `source`: producer name
    /// - `error`: drain failure, if the run ended in an abort
    /// - `pending`: items left undelivered (aborts only)
    /// - `at` / `seq`
    ProducerStopped,

    /// Items are available to drain. Fires exactly once per drain cycle and
    /// never while the queue is empty.
    ///
    /// Sets:
    /// - `source`: producer name
    /// - `pending`: queue depth at emission
    /// - `at` / `seq`
    ItemsProduced,

    /// A consumer drained the queue to empty.
    ///
    /// Sets:
    /// - `source`: producer name
    /// - `at` / `seq`
    ItemsConsumed,

    // === Engine events ===
    /// A task engine's busy run began (its directive producer woke).
    ///
    /// Sets:
    /// - `source`: engine name
    /// - `at` / `seq`
    EngineStarted,

    /// A task engine went idle on both internal producers, or aborted.
    ///
    /// Sets:
    /// - `source`: engine name
    /// - `error`: abort failure, if any
    /// - `pending`: directives counted failed on abort
    /// - `at` / `seq`
    EngineStopped,

    /// One directive produced an `Error`-classified result.
    ///
    /// Sets:
    /// - `source`: engine name
    /// - `error`: the result's error text
    /// - `at` / `seq`
    TaskFailed,

    // === Machine events ===
    /// A state machine left its initial/idle state and began a busy run.
    ///
    /// Sets:
    /// - `source`: machine name
    /// - `at` / `seq`
    MachineStarted,

    /// A state machine entered its idle state and its stop gate agreed.
    ///
    /// Sets:
    /// - `source`: machine name
    /// - `at` / `seq`
    MachineStopped,

    /// A state transition is about to commit.
    ///
    /// Sets:
    /// - `source`: machine name
    /// - `from` / `to`: state names
    /// - `error`: the triggering event's error, if any
    /// - `at` / `seq`
    StateChanging,

    /// A state transition committed.
    ///
    /// Sets:
    /// - `source`: machine name
    /// - `from` / `to`: state names
    /// - `error`: the triggering event's error, if any
    /// - `at` / `seq`
    StateChanged,

    // === Command events ===
    /// A command began executing.
    ///
    /// Sets:
    /// - `source`: bus owner (controller) or command host
    /// - `command`: command name
    /// - `at` / `seq`
    CommandExecuting,

    /// A command (or aggregate) finished successfully.
    ///
    /// Sets:
    /// - `command`: command name
    /// - `at` / `seq`
    CommandCompleted,

    /// A command failed: precondition, body error, or captured panic.
    ///
    /// Sets:
    /// - `command`: command name
    /// - `error`: failure text
    /// - `at` / `seq`
    CommandFailed,

    /// A command's availability may have changed; re-query `can_execute`.
    ///
    /// Sets:
    /// - `command`: command name
    /// - `at` / `seq`
    CanExecuteChanged,

    // === Observer events ===
    /// An observer panicked while processing an event.
    ///
    /// Sets:
    /// - `source`: observer name
    /// - `error`: panic text
    /// - `at` / `seq`
    ObserverPanicked,

    /// An observer dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: observer name
    /// - `error`: reason string ("full", "closed")
    /// - `at` / `seq`
    ObserverOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the component that emitted this event.
    pub source: Option<Arc<str>>,
    /// Failure text, when the event reports an error.
    pub error: Option<Arc<str>>,
    /// State the machine is leaving (transition events).
    pub from: Option<Arc<str>>,
    /// State the machine is entering (transition events).
    pub to: Option<Arc<str>>,
    /// Queue depth at emission (queue events) or failed count (engine abort).
    pub pending: Option<usize>,
    /// Command name (command events).
    pub command: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next global sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            error: None,
            from: None,
            to: None,
            pending: None,
            command: None,
        }
    }

    /// Attaches the emitting component's name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a failure text.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches a failure text if one is present.
    #[inline]
    pub fn with_error_opt(mut self, error: Option<Arc<str>>) -> Self {
        self.error = error;
        self
    }

    /// Attaches transition endpoints (state names).
    #[inline]
    pub fn with_states(mut self, from: impl Into<Arc<str>>, to: impl Into<Arc<str>>) -> Self {
        self.from = Some(from.into());
        self.to = Some(to.into());
        self
    }

    /// Attaches a queue depth / pending count.
    #[inline]
    pub fn with_pending(mut self, pending: usize) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Attaches a command name.
    #[inline]
    pub fn with_command(mut self, command: impl Into<Arc<str>>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// True when this event reports a failure.
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// True when this event came from the named component.
    #[inline]
    pub fn is_from(&self, source: &str) -> bool {
        self.source.as_deref() == Some(source)
    }

    /// Creates an observer overflow event.
    #[inline]
    pub fn observer_overflow(observer: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::ObserverOverflow)
            .with_source(observer)
            .with_error(reason)
    }

    /// Creates an observer panic event.
    #[inline]
    pub fn observer_panicked(observer: &'static str, info: String) -> Self {
        Event::new(EventKind::ObserverPanicked)
            .with_source(observer)
            .with_error(info)
    }

    /// True for observer-originated noise that must not be re-fanned-out.
    #[inline]
    pub fn is_observer_noise(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ObserverOverflow | EventKind::ObserverPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::ItemsProduced);
        let b = Event::new(EventKind::ItemsConsumed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_set_fields() {
        let ev = Event::new(EventKind::StateChanged)
            .with_source("ctrl")
            .with_states("Loading", "Idle")
            .with_error("bad row");

        assert!(ev.is_from("ctrl"));
        assert!(!ev.is_from("other"));
        assert!(ev.is_failure());
        assert_eq!(ev.from.as_deref(), Some("Loading"));
        assert_eq!(ev.to.as_deref(), Some("Idle"));
    }

    #[test]
    fn error_opt_passes_through_none() {
        let ev = Event::new(EventKind::ProducerStopped).with_error_opt(None);
        assert!(!ev.is_failure());
    }
}
