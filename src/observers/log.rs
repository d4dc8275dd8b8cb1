//! # Simple logging observer for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! Enabled via the `logging` feature; primarily useful for development,
//! demos, and examples — implement a custom [`Observe`] for structured
//! logging or metrics collection.
//!
//! ## Output format
//! ```text
//! [producer-started] source=ingest.directives
//! [items-produced] source=ingest.directives pending=12
//! [task-failed] source=ingest err="bad row"
//! [state-changed] source=ctrl Loading -> Idle
//! [command-completed] command=flush
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::observers::observe::Observe;

/// Stdout logging observer.
pub struct LogWriter;

impl LogWriter {
    fn source(ev: &Event) -> &str {
        ev.source.as_deref().unwrap_or("?")
    }
}

#[async_trait]
impl Observe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::ProducerStarted => {
                println!("[producer-started] source={}", Self::source(e));
            }
            EventKind::ProducerStopped => match &e.error {
                Some(err) => println!(
                    "[producer-stopped] source={} err={:?} pending={:?}",
                    Self::source(e),
                    err,
                    e.pending
                ),
                None => println!("[producer-stopped] source={}", Self::source(e)),
            },
            EventKind::ItemsProduced => {
                println!(
                    "[items-produced] source={} pending={:?}",
                    Self::source(e),
                    e.pending
                );
            }
            EventKind::ItemsConsumed => {
                println!("[items-consumed] source={}", Self::source(e));
            }
            EventKind::EngineStarted => {
                println!("[engine-started] source={}", Self::source(e));
            }
            EventKind::EngineStopped => match &e.error {
                Some(err) => println!(
                    "[engine-stopped] source={} err={:?}",
                    Self::source(e),
                    err
                ),
                None => println!("[engine-stopped] source={}", Self::source(e)),
            },
            EventKind::TaskFailed => {
                println!(
                    "[task-failed] source={} err={:?}",
                    Self::source(e),
                    e.error
                );
            }
            EventKind::MachineStarted => {
                println!("[machine-started] source={}", Self::source(e));
            }
            EventKind::MachineStopped => {
                println!("[machine-stopped] source={}", Self::source(e));
            }
            EventKind::StateChanging | EventKind::StateChanged => {
                let label = if e.kind == EventKind::StateChanging {
                    "state-changing"
                } else {
                    "state-changed"
                };
                println!(
                    "[{label}] source={} {} -> {}",
                    Self::source(e),
                    e.from.as_deref().unwrap_or("?"),
                    e.to.as_deref().unwrap_or("?"),
                );
            }
            EventKind::CommandExecuting => {
                println!("[command-executing] command={:?}", e.command);
            }
            EventKind::CommandCompleted => {
                println!("[command-completed] command={:?}", e.command);
            }
            EventKind::CommandFailed => {
                println!(
                    "[command-failed] command={:?} err={:?}",
                    e.command, e.error
                );
            }
            EventKind::CanExecuteChanged => {
                println!("[can-execute-changed] command={:?}", e.command);
            }
            EventKind::ObserverPanicked | EventKind::ObserverOverflow => {
                println!(
                    "[observer-issue] source={} err={:?}",
                    Self::source(e),
                    e.error
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
