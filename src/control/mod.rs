//! Process control: supervising many engines as one unit.
//!
//! ## Contents
//! - [`ProcessController`] — registration, aggregates, health, command
//!   triggers, and the embedded state machine
//! - [`ProcessEngine`] — the supervisable-component seam
//! - [`ProcessRole`] — Producer / Consumer / Auxiliary / Controller
//! - [`ProcessHealth`] — Nominal → TaskError → ProcessError, escalate-only
//! - [`CommandTrigger`] — run a command when a matched event occurs
//!
//! ## Quick wiring
//! ```text
//! ProcessController::new(name, cfg, initial, idle)
//!      ├─ register_components(role, engines)
//!      ├─ register_state_triggers / register_command_triggers
//!      └─ progress() / health() / tasks_per_second() / wait_idle
//! ```

mod controller;
mod health;
mod registration;
mod trigger;

pub use controller::ProcessController;
pub use health::ProcessHealth;
pub use registration::{ProcessEngine, ProcessRole};
pub use trigger::CommandTrigger;
