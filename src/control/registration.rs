//! # Engine registration: roles and the supervised-component seam.
//!
//! A controller supervises anything implementing [`ProcessEngine`]: task
//! engines, other controllers, or custom components. Each registration binds
//! one engine to one [`ProcessRole`]; an engine may be registered under
//! multiple roles, but the controller subscribes to its events only once.

use std::sync::Arc;

use crate::engine::{CounterSnapshot, TaskEngine, TaskWorker};
use crate::events::Bus;

/// Role a registered engine plays in the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// Feeds work into the process; counted in `total_tasks`/`waiting_tasks`.
    Producer,
    /// Finishes work; counted in completion/result aggregates.
    Consumer,
    /// Participates in lifecycle only; not part of any counter aggregate.
    Auxiliary,
    /// A nested controller supervised like any other engine.
    Controller,
}

/// # Supervisable component.
///
/// Object-safe view a [`ProcessController`](crate::ProcessController) needs:
/// identity, an event bus to subscribe to, liveness, optional task counters,
/// and a fire-and-forget teardown.
pub trait ProcessEngine: Send + Sync + 'static {
    /// Stable component name (registration identity).
    fn name(&self) -> &str;

    /// The bus carrying this component's lifecycle events.
    fn bus(&self) -> &Bus;

    /// True while the component is mid-run.
    fn is_busy(&self) -> bool;

    /// Task counters, for components that have them.
    fn counters(&self) -> Option<CounterSnapshot> {
        None
    }

    /// Requests cancellation without waiting.
    fn abort(&self);
}

/// One engine-to-role binding held by a controller.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) engine: Arc<dyn ProcessEngine>,
    pub(crate) role: ProcessRole,
}

impl<W: TaskWorker> ProcessEngine for TaskEngine<W> {
    fn name(&self) -> &str {
        TaskEngine::name(self)
    }

    fn bus(&self) -> &Bus {
        TaskEngine::bus(self)
    }

    fn is_busy(&self) -> bool {
        TaskEngine::is_busy(self)
    }

    fn counters(&self) -> Option<CounterSnapshot> {
        Some(TaskEngine::counters(self))
    }

    fn abort(&self) {
        // Fire-and-forget: cancel both internal stages without waiting.
        self.abort_stages();
    }
}
