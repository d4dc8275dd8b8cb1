//! Commands: conditional units of work and their composition.
//!
//! ## Contents
//! - [`Command`] — the execution seam with the provided lifecycle
//!   (executing → run → completed/failed, panics captured then resumed)
//! - [`RelayCommand`] — closure-backed implementation
//! - [`AggregateCommand`] — composite with fail-fast-or-independent children
//! - [`CommandParam`] — the opaque execution parameter
//!
//! ## Quick wiring
//! ```text
//! RelayCommand::arc(name, bus, |param| async { ... })
//!      .with_can_execute(|param| ...)     — optional precondition
//!      .async_execution(true)             — spawn instead of inline
//! AggregateCommand::arc(name, bus, children)
//! cmd.execute(param).await               — the whole lifecycle
//! ```

mod aggregate;
mod command;
mod relay;

use std::any::Any;
use std::sync::Arc;

/// Opaque execution parameter passed to commands.
///
/// Downcast inside the body: `param.downcast_ref::<YourType>()`. Command
/// triggers invoke their commands with no parameter.
pub type CommandParam = Arc<dyn Any + Send + Sync>;

pub use aggregate::AggregateCommand;
pub use command::Command;
pub use relay::RelayCommand;
