//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by producers, task engines,
//! state machines, controllers, and commands.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — closed event classification and metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ItemProducer` (lifecycle + drain signals), `TaskEngine`
//!   (lifecycle + per-task failures), `StateMachine` (transitions), commands
//!   (execution lifecycle).
//! - **Consumers**: `StateMachine::register_source` listeners,
//!   `ProcessController` registration subscriptions, `ObserverSet` pumps.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
