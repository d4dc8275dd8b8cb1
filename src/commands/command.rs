//! # Command: a named, conditional unit of work.
//!
//! [`Command`] is the execution seam the controller (and any caller) drives.
//! The provided [`Command::execute`] implements the whole lifecycle; an
//! implementation supplies the identity, the precondition, and the body:
//!
//! ```text
//! execute(param)
//!   ├─ is_async()?  ──spawn──►  execute_to_completion(param)   (own task)
//!   └─ inline ────────────────► execute_to_completion(param)
//!
//! execute_to_completion(param)
//!   ├─ publish CommandExecuting
//!   ├─ re-check can_execute(param)       — false → CommandFailed + Err(InvalidOperation)
//!   └─ run_and_notify(param)
//!        ├─ Ok        → CommandCompleted
//!        ├─ Err(e)    → CommandFailed, Err(e)      (recoverable tier)
//!        └─ panic     → CommandFailed, resume_unwind (unclassified tier)
//! ```
//!
//! ## Rules
//! - The precondition is **re-evaluated at execution time** even if checked
//!   earlier; a false precondition surfaces as an explicit
//!   [`Error::InvalidOperation`] plus the `CommandFailed` notification, never
//!   as an unwind.
//! - A panicking body is first captured into `CommandFailed` so at least one
//!   observer sees it, then resumes unwinding: into the caller for inline
//!   execution, onto the spawned task for async execution.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::commands::CommandParam;
use crate::error::{panic_text, Error};
use crate::events::{Bus, Event, EventKind};

/// # Synchronous-or-asynchronous unit of work with a precondition.
///
/// Implementations provide `name`, `bus`, `can_execute`, and `run`; the
/// provided lifecycle methods do the rest. See the module docs for the
/// event/error contract.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// Stable command name (the `command` field of its events).
    fn name(&self) -> &str;

    /// The bus this command's lifecycle events are published on.
    fn bus(&self) -> &Bus;

    /// True to run the body on its own spawned task.
    fn is_async(&self) -> bool {
        false
    }

    /// Precondition over the execution parameter.
    fn can_execute(&self, param: Option<&CommandParam>) -> bool {
        let _ = param;
        true
    }

    /// The command body.
    async fn run(&self, param: Option<CommandParam>) -> Result<(), Error>;

    /// Publishes `CanExecuteChanged` so callers re-query the precondition.
    fn notify_can_execute_changed(&self) {
        self.bus()
            .publish(Event::new(EventKind::CanExecuteChanged).with_command(self.name().to_string()));
    }

    /// Runs the lifecycle, inline or spawned per [`Command::is_async`].
    ///
    /// Async execution returns `Ok(())` as soon as the body is dispatched;
    /// its outcome is observable only through the command's events.
    async fn execute(self: Arc<Self>, param: Option<CommandParam>) -> Result<(), Error> {
        if self.is_async() {
            let me = Arc::clone(&self);
            tokio::spawn(async move {
                let _ = me.execute_to_completion(param).await;
            });
            Ok(())
        } else {
            self.execute_to_completion(param).await
        }
    }

    /// The full lifecycle, always awaited to its end.
    ///
    /// Use this instead of [`Command::execute`] when the caller already
    /// provides the asynchronous context and needs the outcome (the
    /// controller's command triggers do).
    async fn execute_to_completion(
        self: Arc<Self>,
        param: Option<CommandParam>,
    ) -> Result<(), Error> {
        self.bus()
            .publish(Event::new(EventKind::CommandExecuting).with_command(self.name().to_string()));

        if !self.can_execute(param.as_ref()) {
            let err = Error::invalid_operation(format!(
                "precondition failed for command '{}'",
                self.name()
            ));
            self.bus().publish(
                Event::new(EventKind::CommandFailed)
                    .with_command(self.name().to_string())
                    .with_error(err.as_message()),
            );
            return Err(err);
        }

        self.run_and_notify(param).await
    }

    /// Runs the body and publishes the terminal notification.
    ///
    /// Panics are published as `CommandFailed` first, then resumed.
    async fn run_and_notify(&self, param: Option<CommandParam>) -> Result<(), Error> {
        let outcome = AssertUnwindSafe(self.run(param)).catch_unwind().await;
        match outcome {
            Ok(Ok(())) => {
                self.bus().publish(
                    Event::new(EventKind::CommandCompleted).with_command(self.name().to_string()),
                );
                Ok(())
            }
            Ok(Err(err)) => {
                self.bus().publish(
                    Event::new(EventKind::CommandFailed)
                        .with_command(self.name().to_string())
                        .with_error(err.as_message()),
                );
                Err(err)
            }
            Err(payload) => {
                self.bus().publish(
                    Event::new(EventKind::CommandFailed)
                        .with_command(self.name().to_string())
                        .with_error(panic_text(payload.as_ref())),
                );
                std::panic::resume_unwind(payload);
            }
        }
    }
}
