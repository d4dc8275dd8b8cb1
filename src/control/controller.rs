//! # ProcessController: supervises many engines as one process.
//!
//! A [`ProcessController`] embeds a [`StateMachine`] and adds what a
//! supervised process needs on top of raw transitions: a registration table
//! of engines under roles, aggregate counters over those engines, a
//! monotonically escalating health classification, and command triggers fired
//! from the same event stream that drives the state triggers.
//!
//! ## Architecture
//! ```text
//! engine A bus ──listener──┐
//! engine B bus ──listener──┼──► on_event(ev)
//! nested ctrl  ──listener──┘      ├─ hook.on_event(ev)              (subclass seam)
//!                                 ├─ health escalation              (TaskError tier)
//!                                 ├─ command triggers ──spawn──► cmd.execute_to_completion(None)
//!                                 │                                  └─ failure → ProcessError
//!                                 └─ machine.apply_event(ev)       (state triggers)
//!                                      └─ transition with error → ProcessError
//! ```
//!
//! ## Rules
//! - Registration subscribes to an engine's bus **once per engine identity**,
//!   regardless of how many roles it holds; duplicate `(engine, role)` pairs
//!   are ignored.
//! - Aggregates are computed on demand over the current registrations:
//!   Producer-role engines feed `total/waiting`, Consumer-role engines feed
//!   the completion counters, and `progress` averages every counted
//!   registration with queued work.
//! - The controller's stop gate: it is stopping only when **every**
//!   registered engine reports not-busy.
//! - Health starts `Nominal` and only escalates; `reset_health` begins a new
//!   run's classification.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::control::health::{HealthCell, ProcessHealth};
use crate::control::registration::{ProcessEngine, ProcessRole, Registration};
use crate::control::trigger::CommandTrigger;
use crate::engine::CounterSnapshot;
use crate::events::{Bus, Event, EventKind};
use crate::lifecycle::RunClock;
use crate::machine::{EventHook, State, StateMachine, StateTrigger, StopGate};

/// Stop gate over the registration table: stopping only when every
/// registered engine is idle.
struct RegistrationGate {
    regs: Arc<RwLock<Vec<Registration>>>,
}

impl StopGate for RegistrationGate {
    fn is_stopping(&self) -> bool {
        self.regs
            .read()
            .expect("registration lock poisoned")
            .iter()
            .all(|r| !r.engine.is_busy())
    }
}

/// Supervises a set of named engines as one higher-level process.
pub struct ProcessController<S: State> {
    name: Arc<str>,
    bus: Bus,
    machine: Arc<StateMachine<S>>,
    regs: Arc<RwLock<Vec<Registration>>>,
    subscriptions: Mutex<HashMap<String, CancellationToken>>,
    command_triggers: RwLock<Vec<CommandTrigger>>,
    hook: RwLock<Option<Arc<dyn EventHook>>>,
    health: Arc<HealthCell>,
    clock: Arc<RunClock>,
    // Handed to listeners so they never keep the controller alive.
    weak_self: Weak<ProcessController<S>>,
}

impl<S: State> ProcessController<S> {
    /// Creates the controller: its own bus, the embedded machine (same name,
    /// so controller transitions carry the controller as `source`), the
    /// registration-aware stop gate, and the run clock. Must be called from
    /// within a tokio runtime.
    pub fn new(name: impl Into<Arc<str>>, cfg: Config, initial: S, idle: S) -> Arc<Self> {
        let name: Arc<str> = name.into();
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let machine = StateMachine::new(name.clone(), bus.clone(), initial, idle);

        let regs: Arc<RwLock<Vec<Registration>>> = Arc::new(RwLock::new(Vec::new()));
        machine.set_stop_gate(Arc::new(RegistrationGate {
            regs: Arc::clone(&regs),
        }));

        let health = Arc::new(HealthCell::new());
        let clock = Arc::new(RunClock::new());
        tokio::spawn(Self::run_tracker(machine.busy_watch(), Arc::clone(&clock)));

        Arc::new_cyclic(|weak| Self {
            name,
            bus,
            machine,
            regs,
            subscriptions: Mutex::new(HashMap::new()),
            command_triggers: RwLock::new(Vec::new()),
            hook: RwLock::new(None),
            health,
            clock,
            weak_self: weak.clone(),
        })
    }

    /// Brackets each busy run on the throughput clock.
    async fn run_tracker(mut busy_rx: watch::Receiver<bool>, clock: Arc<RunClock>) {
        let mut running = false;
        loop {
            let busy = *busy_rx.borrow();
            if busy != running {
                running = busy;
                if busy {
                    clock.start();
                } else {
                    clock.stop();
                }
            }
            if busy_rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Installs the subclass-style reaction hook, called for every event
    /// before health, command triggers, and state triggers.
    pub fn set_hook(&self, hook: Arc<dyn EventHook>) {
        *self.hook.write().expect("hook lock poisoned") = Some(hook);
    }

    // ---- Registration ----

    /// Registers engines under a role.
    ///
    /// Duplicate `(engine, role)` bindings are ignored; an engine already
    /// subscribed (under any role) is not re-subscribed.
    pub fn register_components(&self, role: ProcessRole, engines: Vec<Arc<dyn ProcessEngine>>) {
        for engine in engines {
            let engine_name = engine.name().to_string();
            {
                let mut regs = self.regs.write().expect("registration lock poisoned");
                let duplicate = regs
                    .iter()
                    .any(|r| r.role == role && r.engine.name() == engine_name);
                if duplicate {
                    continue;
                }
                regs.push(Registration {
                    engine: Arc::clone(&engine),
                    role,
                });
            }

            let mut subs = self.subscriptions.lock().expect("subscription lock poisoned");
            subs.entry(engine_name)
                .or_insert_with(|| self.spawn_listener(engine.bus()));
        }
    }

    /// Removes bindings and, when the last binding for an engine goes away,
    /// detaches its event subscription.
    pub fn deregister_components(&self, role: ProcessRole, names: &[&str]) {
        let mut regs = self.regs.write().expect("registration lock poisoned");
        regs.retain(|r| !(r.role == role && names.contains(&r.engine.name())));

        let mut subs = self.subscriptions.lock().expect("subscription lock poisoned");
        for name in names {
            let still_bound = regs.iter().any(|r| r.engine.name() == *name);
            if !still_bound {
                if let Some(token) = subs.remove(*name) {
                    token.cancel();
                }
            }
        }
    }

    /// Spawns the bus→funnel listener for one engine.
    fn spawn_listener(&self, bus: &Bus) -> CancellationToken {
        let token = CancellationToken::new();
        let guard = token.clone();
        let mut rx = bus.subscribe();
        let controller = self.weak_self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(ev) => {
                            let Some(controller) = controller.upgrade() else {
                                break;
                            };
                            controller.on_event(&ev).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
        token
    }

    /// The controller's event funnel. See the module docs for the order of
    /// the passes.
    async fn on_event(&self, ev: &Event) {
        let hook = self.hook.read().expect("hook lock poisoned").clone();
        if let Some(hook) = hook {
            hook.on_event(ev).await;
        }

        // Task-tier health: an engine failed work or stopped with an error.
        match ev.kind {
            EventKind::TaskFailed => self.health.escalate(ProcessHealth::TaskError),
            EventKind::EngineStopped | EventKind::ProducerStopped if ev.is_failure() => {
                self.health.escalate(ProcessHealth::TaskError)
            }
            _ => {}
        }
        if self.failed_results() > 0 {
            self.health.escalate(ProcessHealth::TaskError);
        }

        // Command triggers: every match fires, with no parameter,
        // fire-and-forget; failures escalate to the process tier.
        let matched: Vec<_> = self
            .command_triggers
            .read()
            .expect("command trigger lock poisoned")
            .iter()
            .filter(|t| t.matches(ev))
            .map(|t| t.command())
            .collect();
        for command in matched {
            let health = Arc::clone(&self.health);
            tokio::spawn(async move {
                if command.execute_to_completion(None).await.is_err() {
                    health.escalate(ProcessHealth::ProcessError);
                }
            });
        }

        // State triggers: a committed transition carrying an error is the
        // controller's own failed transition.
        let committed = self.machine.apply_event(ev);
        if committed > 0 && ev.is_failure() {
            self.health.escalate(ProcessHealth::ProcessError);
        }
    }

    // ---- Triggers ----

    /// Appends state triggers (registration order matters).
    pub fn register_state_triggers(&self, triggers: Vec<StateTrigger<S>>) {
        self.machine.register_state_triggers(triggers);
    }

    /// Removes state triggers by name.
    pub fn deregister_state_triggers(&self, names: &[&str]) {
        self.machine.deregister_state_triggers(names);
    }

    /// Clears all state triggers.
    pub fn clear_state_triggers(&self) {
        self.machine.clear_state_triggers();
    }

    /// Appends command triggers.
    pub fn register_command_triggers(&self, triggers: Vec<CommandTrigger>) {
        self.command_triggers
            .write()
            .expect("command trigger lock poisoned")
            .extend(triggers);
    }

    /// Removes command triggers by name.
    pub fn deregister_command_triggers(&self, names: &[&str]) {
        self.command_triggers
            .write()
            .expect("command trigger lock poisoned")
            .retain(|t| !names.contains(&t.name()));
    }

    /// Clears all command triggers.
    pub fn clear_command_triggers(&self) {
        self.command_triggers
            .write()
            .expect("command trigger lock poisoned")
            .clear();
    }

    // ---- Aggregates ----

    fn sum_over<F>(&self, role: ProcessRole, pick: F) -> u64
    where
        F: Fn(&CounterSnapshot) -> u64,
    {
        self.regs
            .read()
            .expect("registration lock poisoned")
            .iter()
            .filter(|r| r.role == role)
            .filter_map(|r| r.engine.counters())
            .map(|snap| pick(&snap))
            .sum()
    }

    /// Directives ever queued, over Producer-role engines with counters.
    pub fn total_tasks(&self) -> u64 {
        self.sum_over(ProcessRole::Producer, |s| s.total)
    }

    /// Directives still waiting, over Producer-role engines with counters.
    pub fn waiting_tasks(&self) -> usize {
        self.regs
            .read()
            .expect("registration lock poisoned")
            .iter()
            .filter(|r| r.role == ProcessRole::Producer)
            .filter_map(|r| r.engine.counters())
            .map(|snap| snap.waiting)
            .sum()
    }

    /// Completed tasks, over Consumer-role engines with counters.
    pub fn completed_tasks(&self) -> u64 {
        self.sum_over(ProcessRole::Consumer, |s| s.completed)
    }

    /// Successful results, over Consumer-role engines with counters.
    pub fn successful_results(&self) -> u64 {
        self.sum_over(ProcessRole::Consumer, |s| s.successful)
    }

    /// Empty results, over Consumer-role engines with counters.
    pub fn empty_results(&self) -> u64 {
        self.sum_over(ProcessRole::Consumer, |s| s.empty)
    }

    /// Failed results, over Consumer-role engines with counters.
    pub fn failed_results(&self) -> u64 {
        self.sum_over(ProcessRole::Consumer, |s| s.failed)
    }

    /// Mean progress over every counted registration with queued work; 0
    /// while none has any.
    pub fn progress(&self) -> f64 {
        let regs = self.regs.read().expect("registration lock poisoned");
        let progresses: Vec<f64> = regs
            .iter()
            .filter_map(|r| r.engine.counters())
            .filter(|snap| snap.total > 0)
            .map(|snap| snap.progress)
            .collect();
        if progresses.is_empty() {
            0.0
        } else {
            progresses.iter().sum::<f64>() / progresses.len() as f64
        }
    }

    /// Completed tasks per second of the controller's own busy time.
    pub fn tasks_per_second(&self) -> f64 {
        self.clock.rate(self.completed_tasks())
    }

    /// Current health classification.
    pub fn health(&self) -> ProcessHealth {
        self.health.current()
    }

    /// Back to `Nominal`, beginning a new run's classification. Escalation
    /// between runs is latched until this is called.
    pub fn reset_health(&self) {
        self.health.reset();
    }

    // ---- Lifecycle ----

    /// Current state of the embedded machine.
    pub fn current_state(&self) -> S {
        self.machine.current()
    }

    /// True while the controller's busy run is in progress.
    pub fn is_busy(&self) -> bool {
        self.machine.is_busy()
    }

    /// Waits until the controller's busy run ends.
    pub async fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        self.machine.wait_idle(timeout).await
    }

    /// Requests cancellation of every registered engine, without waiting.
    pub fn abort_engines(&self) {
        for reg in self
            .regs
            .read()
            .expect("registration lock poisoned")
            .iter()
        {
            reg.engine.abort();
        }
    }

    /// Controller name (the `source` of its transition events).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The controller's own bus: transitions, machine lifecycle, and any
    /// command constructed over it.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

impl<S: State> ProcessEngine for ProcessController<S> {
    fn name(&self) -> &str {
        ProcessController::name(self)
    }

    fn bus(&self) -> &Bus {
        ProcessController::bus(self)
    }

    fn is_busy(&self) -> bool {
        ProcessController::is_busy(self)
    }

    /// Nested controllers contribute their aggregates to the parent.
    fn counters(&self) -> Option<CounterSnapshot> {
        Some(CounterSnapshot {
            total: self.total_tasks(),
            waiting: self.waiting_tasks(),
            successful: self.successful_results(),
            empty: self.empty_results(),
            failed: self.failed_results(),
            completed: self.completed_tasks(),
            progress: self.progress(),
            tasks_per_second: self.tasks_per_second(),
        })
    }

    fn abort(&self) {
        self.abort_engines();
    }
}

impl<S: State> Drop for ProcessController<S> {
    fn drop(&mut self) {
        for token in self
            .subscriptions
            .lock()
            .expect("subscription lock poisoned")
            .values()
        {
            token.cancel();
        }
    }
}
