//! # Closure-backed command (`RelayCommand`)
//!
//! [`RelayCommand`] wraps a closure `F: Fn(Option<CommandParam>) -> Fut`,
//! producing a fresh future per execution. The precondition defaults to
//! "always executable" and can be replaced with
//! [`RelayCommand::with_can_execute`].
//!
//! ## Example
//! ```rust
//! use conveyor::{Bus, RelayCommand};
//!
//! let bus = Bus::new(16);
//! let cmd = RelayCommand::arc("flush", bus, |_param| async move {
//!     // do work...
//!     Ok(())
//! });
//! assert_eq!(conveyor::Command::name(&*cmd), "flush");
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::{Command, CommandParam};
use crate::error::Error;
use crate::events::Bus;

/// Predicate type for the optional precondition.
type CanExecuteFn = Box<dyn Fn(Option<&CommandParam>) -> bool + Send + Sync>;

/// Function-backed command implementation.
///
/// Wraps a closure that *creates* a new future per execution.
pub struct RelayCommand<F> {
    name: Arc<str>,
    bus: Bus,
    run_fn: F,
    can_execute_fn: Option<CanExecuteFn>,
    execute_async: bool,
}

impl<F, Fut> RelayCommand<F>
where
    F: Fn(Option<CommandParam>) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    /// Creates a new function-backed command publishing on `bus`.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus, run_fn: F) -> Self {
        Self {
            name: name.into(),
            bus,
            run_fn,
            can_execute_fn: None,
            execute_async: false,
        }
    }

    /// Creates the command and returns it as a shared handle.
    pub fn arc(name: impl Into<Arc<str>>, bus: Bus, run_fn: F) -> Arc<Self> {
        Arc::new(Self::new(name, bus, run_fn))
    }

    /// Replaces the precondition.
    pub fn with_can_execute(
        mut self,
        predicate: impl Fn(Option<&CommandParam>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.can_execute_fn = Some(Box::new(predicate));
        self
    }

    /// Switches the execution mode (default: inline).
    pub fn async_execution(mut self, execute_async: bool) -> Self {
        self.execute_async = execute_async;
        self
    }
}

#[async_trait]
impl<F, Fut> Command for RelayCommand<F>
where
    F: Fn(Option<CommandParam>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn bus(&self) -> &Bus {
        &self.bus
    }

    fn is_async(&self) -> bool {
        self.execute_async
    }

    fn can_execute(&self, param: Option<&CommandParam>) -> bool {
        self.can_execute_fn
            .as_ref()
            .map(|predicate| predicate(param))
            .unwrap_or(true)
    }

    async fn run(&self, param: Option<CommandParam>) -> Result<(), Error> {
        (self.run_fn)(param).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn relay_runs_its_closure() {
        let bus = Bus::new(32);
        let runs = Arc::new(AtomicUsize::new(0));

        let counted = runs.clone();
        let cmd = RelayCommand::arc("count", bus.clone(), move |_param| {
            let runs = counted.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        cmd.execute(None).await.expect("runs");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn relay_precondition_gates_execution() {
        let bus = Bus::new(32);
        let mut rx = bus.subscribe();

        let cmd = Arc::new(
            RelayCommand::new("gated", bus, |_param| async move { Ok(()) })
                .with_can_execute(|param| param.is_some()),
        );

        let err = cmd.clone().execute(None).await.expect_err("gated");
        assert_eq!(err.as_label(), "invalid_operation");

        let param: CommandParam = Arc::new(42u32);
        cmd.execute(Some(param)).await.expect("armed");

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::CommandExecuting,
                EventKind::CommandFailed,
                EventKind::CommandExecuting,
                EventKind::CommandCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn relay_parameter_is_downcastable() {
        let bus = Bus::new(32);
        let seen = Arc::new(AtomicUsize::new(0));

        let sink = seen.clone();
        let cmd = RelayCommand::arc("typed", bus, move |param: Option<CommandParam>| {
            let seen = sink.clone();
            async move {
                let value = param
                    .as_ref()
                    .and_then(|p| p.downcast_ref::<usize>())
                    .copied()
                    .ok_or_else(|| Error::invalid_argument("expected a usize parameter"))?;
                seen.store(value, Ordering::SeqCst);
                Ok(())
            }
        });

        let param: CommandParam = Arc::new(7usize);
        cmd.execute(Some(param)).await.expect("typed run");
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }
}
