//! # Event triggers: the atomic unit of event matching.
//!
//! An [`EventTrigger`] wraps a named predicate over an [`Event`] (the event
//! carries its sender as `source`, so "predicate over (sender, event)" is one
//! closure here). A [`StateTrigger`] is an event trigger that additionally
//! names the target state to transition to when matched.
//!
//! ## Rules
//! - Triggers are evaluated in registration order.
//! - **All** matching triggers fire, not just the first; for state triggers
//!   the last committed target wins.
//! - Triggers are identified by name for deregistration.

use std::fmt;
use std::sync::Arc;

use crate::events::{Event, EventKind};

/// Named predicate over runtime events.
#[derive(Clone)]
pub struct EventTrigger {
    name: Arc<str>,
    predicate: Arc<dyn Fn(&Event) -> bool + Send + Sync>,
}

impl EventTrigger {
    /// Creates a trigger from an arbitrary predicate.
    pub fn new(
        name: impl Into<Arc<str>>,
        predicate: impl Fn(&Event) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Matches any event of the given kind.
    pub fn on_kind(name: impl Into<Arc<str>>, kind: EventKind) -> Self {
        Self::new(name, move |ev| ev.kind == kind)
    }

    /// Matches events of the given kind from the named source.
    pub fn on_source_kind(
        name: impl Into<Arc<str>>,
        source: impl Into<Arc<str>>,
        kind: EventKind,
    ) -> Self {
        let source: Arc<str> = source.into();
        Self::new(name, move |ev| {
            ev.kind == kind && ev.source.as_deref() == Some(source.as_ref())
        })
    }

    /// The trigger's registration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluates the predicate.
    pub fn matches(&self, ev: &Event) -> bool {
        (self.predicate)(ev)
    }
}

impl fmt::Debug for EventTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTrigger").field("name", &self.name).finish()
    }
}

/// An event trigger that names a target state.
#[derive(Debug, Clone)]
pub struct StateTrigger<S> {
    trigger: EventTrigger,
    target: S,
}

impl<S: Copy> StateTrigger<S> {
    /// Binds a trigger to a target state.
    pub fn new(trigger: EventTrigger, target: S) -> Self {
        Self { trigger, target }
    }

    /// The underlying event trigger.
    pub fn trigger(&self) -> &EventTrigger {
        &self.trigger
    }

    /// The registration name (the trigger's name).
    pub fn name(&self) -> &str {
        self.trigger.name()
    }

    /// Evaluates the predicate.
    pub fn matches(&self, ev: &Event) -> bool {
        self.trigger.matches(ev)
    }

    /// The state to transition to on a match.
    pub fn target(&self) -> S {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_trigger_matches_kind_only() {
        let t = EventTrigger::on_kind("start", EventKind::EngineStarted);
        assert!(t.matches(&Event::new(EventKind::EngineStarted).with_source("x")));
        assert!(!t.matches(&Event::new(EventKind::EngineStopped)));
        assert_eq!(t.name(), "start");
    }

    #[test]
    fn source_kind_trigger_requires_both() {
        let t = EventTrigger::on_source_kind("ingest-stop", "ingest", EventKind::EngineStopped);
        assert!(t.matches(&Event::new(EventKind::EngineStopped).with_source("ingest")));
        assert!(!t.matches(&Event::new(EventKind::EngineStopped).with_source("other")));
        assert!(!t.matches(&Event::new(EventKind::EngineStarted).with_source("ingest")));
    }

    #[test]
    fn state_trigger_carries_target() {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Phase {
            Running,
        }
        let t = StateTrigger::new(
            EventTrigger::on_kind("go", EventKind::EngineStarted),
            Phase::Running,
        );
        assert_eq!(t.target(), Phase::Running);
        assert!(t.matches(&Event::new(EventKind::EngineStarted)));
    }
}
