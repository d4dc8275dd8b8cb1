//! # Command triggers: execute a command when a matched event occurs.
//!
//! A [`CommandTrigger`] binds an [`EventTrigger`] predicate to a
//! [`Command`]. A controller checks every event reaching its funnel against
//! all registered command triggers; each match invokes the bound command with
//! no parameter, fire-and-forget — the outcome is observed only through the
//! command's own events (and the controller's health).

use std::fmt;
use std::sync::Arc;

use crate::commands::Command;
use crate::events::Event;
use crate::machine::EventTrigger;

/// Binding of an event predicate to a command.
#[derive(Clone)]
pub struct CommandTrigger {
    trigger: EventTrigger,
    command: Arc<dyn Command>,
}

impl CommandTrigger {
    /// Binds a trigger to the command it should fire.
    pub fn new(trigger: EventTrigger, command: Arc<dyn Command>) -> Self {
        Self { trigger, command }
    }

    /// The registration name (the trigger's name).
    pub fn name(&self) -> &str {
        self.trigger.name()
    }

    /// Evaluates the predicate.
    pub fn matches(&self, ev: &Event) -> bool {
        self.trigger.matches(ev)
    }

    /// The bound command.
    pub fn command(&self) -> Arc<dyn Command> {
        Arc::clone(&self.command)
    }
}

impl fmt::Debug for CommandTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTrigger")
            .field("name", &self.name())
            .field("command", &self.command.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::RelayCommand;
    use crate::events::{Bus, EventKind};

    #[test]
    fn trigger_matches_and_exposes_its_command() {
        let bus = Bus::new(8);
        let cmd = RelayCommand::arc("noop", bus, |_param| async move { Ok(()) });
        let trigger = CommandTrigger::new(
            EventTrigger::on_kind("on-stop", EventKind::EngineStopped),
            cmd,
        );

        assert_eq!(trigger.name(), "on-stop");
        assert!(trigger.matches(&Event::new(EventKind::EngineStopped)));
        assert!(!trigger.matches(&Event::new(EventKind::EngineStarted)));
        assert_eq!(trigger.command().name(), "noop");
    }
}
