//! State machines: event triggers and the generic trigger-driven FSM.
//!
//! ## Contents
//! - [`EventTrigger`] — named predicate over `(source, event)`
//! - [`StateTrigger`] — an event trigger naming a target state
//! - [`StateMachine`] — current/initial/idle states, busy lifecycle, bus
//!   listeners
//! - [`EventHook`] — subclass-style reaction seam
//! - [`StopGate`] — veto over ending a busy run at the idle state
//!
//! ## Quick wiring
//! ```text
//! StateMachine::new(name, bus, initial, idle)
//!      ├─ register_state_triggers(vec![StateTrigger::new(trigger, target)])
//!      ├─ register_source(&engine_bus)      — spawn a forwarding listener
//!      └─ current() / wait_idle / busy_watch
//! ```

mod state;
mod triggers;

pub use state::{EventHook, State, StateMachine, StopGate};
pub use triggers::{EventTrigger, StateTrigger};
