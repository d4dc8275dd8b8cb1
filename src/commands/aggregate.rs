//! # Composite command fanning out to child commands.
//!
//! [`AggregateCommand`] executes an ordered set of child commands and reports
//! success only if all children succeed.
//!
//! ## Rules
//! - **Pre-flight**: every child's precondition is checked before anything
//!   runs; any failure returns [`Error::InvalidOperation`] with no events.
//! - **One terminal notification**: completion is tracked per child with a
//!   first-failure latch, so exactly one of `CommandCompleted` /
//!   `CommandFailed` (carrying the first error) fires — never both. Zero
//!   children still complete.
//! - **Mode propagation**: in async mode children run on their own spawned
//!   tasks and a failure lets the already-running rest complete silently; in
//!   inline mode children run sequentially and a failure skips the rest.
//! - Child lifecycle events still fire individually; the aggregate adds its
//!   own envelope around them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;

use crate::commands::{Command, CommandParam};
use crate::error::Error;
use crate::events::{Bus, Event, EventKind};

/// Composite command with fail-fast-or-independent child semantics.
pub struct AggregateCommand {
    name: Arc<str>,
    bus: Bus,
    children: Vec<Arc<dyn Command>>,
    execute_async: bool,
}

impl AggregateCommand {
    /// Creates an aggregate over the given children, publishing on `bus`.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus, children: Vec<Arc<dyn Command>>) -> Self {
        Self {
            name: name.into(),
            bus,
            children,
            execute_async: false,
        }
    }

    /// Creates the aggregate and returns it as a shared handle.
    pub fn arc(
        name: impl Into<Arc<str>>,
        bus: Bus,
        children: Vec<Arc<dyn Command>>,
    ) -> Arc<Self> {
        Arc::new(Self::new(name, bus, children))
    }

    /// Switches the execution mode propagated to every child.
    pub fn async_execution(mut self, execute_async: bool) -> Self {
        self.execute_async = execute_async;
        self
    }

    /// Number of child commands.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True when the aggregate has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[async_trait]
impl Command for AggregateCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn bus(&self) -> &Bus {
        &self.bus
    }

    fn is_async(&self) -> bool {
        self.execute_async
    }

    /// Executable only when every child is.
    fn can_execute(&self, param: Option<&CommandParam>) -> bool {
        self.children.iter().all(|child| child.can_execute(param))
    }

    /// Overridden: the aggregate pre-flight fails *before anything runs* and
    /// without events, unlike the base lifecycle which reports the failed
    /// precondition through `CommandFailed`.
    async fn execute_to_completion(
        self: Arc<Self>,
        param: Option<CommandParam>,
    ) -> Result<(), Error> {
        for child in &self.children {
            if !child.can_execute(param.as_ref()) {
                return Err(Error::invalid_operation(format!(
                    "aggregate '{}': child '{}' cannot execute",
                    self.name,
                    child.name()
                )));
            }
        }

        self.bus
            .publish(Event::new(EventKind::CommandExecuting).with_command(self.name.to_string()));
        self.run_and_notify(param).await
    }

    /// The fan-out body. The terminal aggregate notification is published by
    /// `run_and_notify` from this result.
    async fn run(&self, param: Option<CommandParam>) -> Result<(), Error> {
        if self.children.is_empty() {
            return Ok(());
        }

        if self.execute_async {
            // Independent children: all are dispatched; the first failure is
            // latched while the rest complete silently (their own events
            // still fire).
            let mut set = JoinSet::new();
            for child in self.children.iter().cloned() {
                let child_param = param.clone();
                set.spawn(async move { child.run_and_notify(child_param).await });
            }

            let mut first_err: Option<Error> = None;
            let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        if first_err.is_none() && first_panic.is_none() {
                            first_err = Some(err);
                        }
                    }
                    Err(join_err) if join_err.is_panic() => {
                        if first_err.is_none() && first_panic.is_none() {
                            first_panic = Some(join_err.into_panic());
                        }
                    }
                    Err(_) => {}
                }
            }

            if let Some(payload) = first_panic {
                // Unclassified tier: the outer lifecycle reports the
                // aggregate failure, then the unwind continues.
                std::panic::resume_unwind(payload);
            }
            match first_err {
                Some(err) => Err(err),
                None => Ok(()),
            }
        } else {
            // Sequential children: the first failure skips the rest. A child
            // panic unwinds through here into the aggregate's own capture.
            for child in &self.children {
                child.run_and_notify(param.clone()).await?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::commands::RelayCommand;

    fn child_ok(name: &'static str, bus: Bus, runs: Arc<AtomicUsize>) -> Arc<dyn Command> {
        RelayCommand::arc(name, bus, move |_param| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn child_err(name: &'static str, bus: Bus) -> Arc<dyn Command> {
        RelayCommand::arc(name, bus, move |_param| async move {
            Err(Error::invalid_operation("child refused"))
        })
    }

    fn aggregate_kinds(
        rx: &mut tokio::sync::broadcast::Receiver<Event>,
        aggregate: &str,
    ) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.command.as_deref() == Some(aggregate) {
                kinds.push(ev.kind);
            }
        }
        kinds
    }

    #[tokio::test]
    async fn four_children_emit_exactly_one_completed() {
        let bus = Bus::new(128);
        let runs = Arc::new(AtomicUsize::new(0));
        let children: Vec<Arc<dyn Command>> = (0..4)
            .map(|i| {
                child_ok(
                    ["a", "b", "c", "d"][i],
                    bus.clone(),
                    runs.clone(),
                )
            })
            .collect();

        let mut rx = bus.subscribe();
        let agg = AggregateCommand::arc("all-four", bus, children);
        agg.execute(None).await.expect("all children succeed");

        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert_eq!(
            aggregate_kinds(&mut rx, "all-four"),
            vec![EventKind::CommandExecuting, EventKind::CommandCompleted]
        );
    }

    #[tokio::test]
    async fn one_failing_child_emits_exactly_one_failed_never_completed() {
        let bus = Bus::new(128);
        let runs = Arc::new(AtomicUsize::new(0));
        let children: Vec<Arc<dyn Command>> = vec![
            child_ok("first", bus.clone(), runs.clone()),
            child_err("broken", bus.clone()),
            child_ok("after", bus.clone(), runs.clone()),
        ];

        let mut rx = bus.subscribe();
        let agg = AggregateCommand::arc("with-failure", bus, children);
        let err = agg.execute(None).await.expect_err("child failed");
        assert_eq!(err.as_label(), "invalid_operation");

        // Sequential mode: the child after the failure never ran.
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let kinds = aggregate_kinds(&mut rx, "with-failure");
        assert_eq!(
            kinds,
            vec![EventKind::CommandExecuting, EventKind::CommandFailed]
        );
    }

    #[tokio::test]
    async fn async_mode_lets_running_children_finish_silently() {
        let bus = Bus::new(128);
        let runs = Arc::new(AtomicUsize::new(0));
        let children: Vec<Arc<dyn Command>> = vec![
            child_err("broken", bus.clone()),
            child_ok("peer-one", bus.clone(), runs.clone()),
            child_ok("peer-two", bus.clone(), runs.clone()),
        ];

        let mut rx = bus.subscribe();
        let agg = Arc::new(
            AggregateCommand::new("independent", bus, children).async_execution(true),
        );
        // Async dispatch acknowledges immediately.
        agg.execute(None).await.expect("dispatched");

        let terminal = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let ev = rx.recv().await.expect("bus open");
                if ev.command.as_deref() == Some("independent")
                    && matches!(ev.kind, EventKind::CommandCompleted | EventKind::CommandFailed)
                {
                    break ev;
                }
            }
        })
        .await
        .expect("terminal event");

        assert_eq!(terminal.kind, EventKind::CommandFailed);
        assert!(terminal.error.is_some());
        // Peers were not interrupted by the failure.
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_children_still_complete() {
        let bus = Bus::new(32);
        let mut rx = bus.subscribe();
        let agg = AggregateCommand::arc("hollow", bus, Vec::new());

        assert!(agg.is_empty());
        agg.execute(None).await.expect("completes");
        assert_eq!(
            aggregate_kinds(&mut rx, "hollow"),
            vec![EventKind::CommandExecuting, EventKind::CommandCompleted]
        );
    }

    #[tokio::test]
    async fn preflight_failure_runs_nothing_and_emits_nothing() {
        let bus = Bus::new(32);
        let runs = Arc::new(AtomicUsize::new(0));

        let armed = child_ok("armed", bus.clone(), runs.clone());
        let disarmed: Arc<dyn Command> = Arc::new(
            RelayCommand::new("disarmed", bus.clone(), |_param| async move { Ok(()) })
                .with_can_execute(|_param| false),
        );

        let mut rx = bus.subscribe();
        let agg = AggregateCommand::arc("preflight", bus, vec![armed, disarmed]);
        let err = agg.execute(None).await.expect_err("pre-flight");
        assert_eq!(err.as_label(), "invalid_operation");

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(aggregate_kinds(&mut rx, "preflight").is_empty());
    }
}
