//! # Generic finite-state machine driven by registered event sources.
//!
//! A [`StateMachine`] holds a current state, an initial state, and an idle
//! state, and reacts to events from any number of registered buses: every
//! event funnels through one handler which first calls the optional
//! subclass-style [`EventHook`], then evaluates the registered
//! [`StateTrigger`]s and transitions accordingly.
//!
//! ## Architecture
//! ```text
//! engine bus ──► listener ─┐
//! engine bus ──► listener ─┼──► handle_event(ev)
//!                          │      ├─ hook.on_event(ev)        (subclass seam)
//!                          │      └─ for each matching trigger (snapshot, in order):
//!                          │           StateChanging ► busy? ► commit ► idle? ► StateChanged
//!                          ▼
//!                  machine's own bus carries MachineStarted/Stopped,
//!                  StateChanging/StateChanged
//! ```
//!
//! ## Rules
//! - A transition to any non-initial, non-idle state begins a busy run; a
//!   transition into the idle state attempts to end it, subject to the
//!   [`StopGate`].
//! - **All** matching triggers fire, in registration order; last committed
//!   state wins. Transition notifications carry the triggering event's error
//!   so failures propagate as machine errors instead of being swallowed.
//! - The trigger list is snapshotted before each evaluation pass, so
//!   registration while dispatch is running on another task is supported.
//! - Do **not** register the machine's own bus as a source: its transition
//!   events would feed back into trigger evaluation.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::lifecycle::BusyFlag;
use crate::machine::triggers::StateTrigger;

/// Marker for user state types.
///
/// Blanket-implemented: any `Copy + Eq + Hash + Debug + Send + Sync + 'static`
/// enum qualifies.
pub trait State: Copy + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T: Copy + Eq + Hash + Debug + Send + Sync + 'static> State for T {}

/// # Subclass-style reaction seam.
///
/// Called for every event that reaches the machine, before trigger
/// evaluation. Implementations run outside all machine locks.
#[async_trait]
pub trait EventHook: Send + Sync + 'static {
    /// Reacts to one event.
    async fn on_event(&self, ev: &Event);
}

/// Veto over ending a busy run when the idle state is entered.
///
/// A controller, for example, is stopping only when every registered engine
/// reports not-busy.
pub trait StopGate: Send + Sync + 'static {
    /// True when the component may end its busy run.
    fn is_stopping(&self) -> bool;
}

/// Generic FSM: current/initial/idle states, named state triggers, busy
/// lifecycle, and bus listeners with detach tokens.
pub struct StateMachine<S: State> {
    name: Arc<str>,
    bus: Bus,
    initial: S,
    idle: S,
    current: RwLock<S>,
    triggers: RwLock<Vec<StateTrigger<S>>>,
    hook: RwLock<Option<Arc<dyn EventHook>>>,
    gate: RwLock<Option<Arc<dyn StopGate>>>,
    busy: BusyFlag,
    // Serializes whole transitions so notification pairs never interleave.
    transition: Mutex<()>,
    sources: Mutex<Vec<CancellationToken>>,
    // Handed to listeners so they never keep the machine alive.
    weak_self: Weak<StateMachine<S>>,
}

impl<S: State> StateMachine<S> {
    /// Creates a machine at `initial`, publishing on the given bus.
    pub fn new(name: impl Into<Arc<str>>, bus: Bus, initial: S, idle: S) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|weak| Self {
            name,
            bus,
            initial,
            idle,
            current: RwLock::new(initial),
            triggers: RwLock::new(Vec::new()),
            hook: RwLock::new(None),
            gate: RwLock::new(None),
            busy: BusyFlag::new(),
            transition: Mutex::new(()),
            sources: Mutex::new(Vec::new()),
            weak_self: weak.clone(),
        })
    }

    /// Installs the subclass-style reaction hook.
    pub fn set_hook(&self, hook: Arc<dyn EventHook>) {
        *self.hook.write().expect("hook lock poisoned") = Some(hook);
    }

    /// Installs the stop gate consulted when the idle state is entered.
    pub fn set_stop_gate(&self, gate: Arc<dyn StopGate>) {
        *self.gate.write().expect("gate lock poisoned") = Some(gate);
    }

    /// Current state.
    pub fn current(&self) -> S {
        *self.current.read().expect("state lock poisoned")
    }

    /// The pre-run state.
    pub fn initial(&self) -> S {
        self.initial
    }

    /// The resting state.
    pub fn idle(&self) -> S {
        self.idle
    }

    /// Appends triggers to the evaluation list (registration order matters).
    pub fn register_state_triggers(&self, triggers: Vec<StateTrigger<S>>) {
        self.triggers
            .write()
            .expect("trigger lock poisoned")
            .extend(triggers);
    }

    /// Removes triggers by name.
    pub fn deregister_state_triggers(&self, names: &[&str]) {
        self.triggers
            .write()
            .expect("trigger lock poisoned")
            .retain(|t| !names.contains(&t.name()));
    }

    /// Clears the trigger list.
    pub fn clear_state_triggers(&self) {
        self.triggers.write().expect("trigger lock poisoned").clear();
    }

    /// The single funnel: hook first, then trigger evaluation.
    pub async fn handle_event(&self, ev: &Event) {
        let hook = self.hook.read().expect("hook lock poisoned").clone();
        if let Some(hook) = hook {
            hook.on_event(ev).await;
        }
        self.apply_event(ev);
    }

    /// Evaluates triggers against one event and commits the matching
    /// transitions. Returns how many transitions were committed.
    ///
    /// Evaluation runs over a snapshot of the trigger list; a trigger
    /// registered mid-pass is first seen by the next event.
    pub fn apply_event(&self, ev: &Event) -> usize {
        let snapshot: Vec<StateTrigger<S>> = self
            .triggers
            .read()
            .expect("trigger lock poisoned")
            .clone();

        let mut committed = 0;
        for trigger in snapshot.iter().filter(|t| t.matches(ev)) {
            self.transition_to(trigger.target(), ev.error.clone());
            committed += 1;
        }
        committed
    }

    /// Commits one transition with its notification pair.
    fn transition_to(&self, target: S, error: Option<Arc<str>>) {
        let _serial = self.transition.lock().expect("transition lock poisoned");

        let from = self.current();
        let from_name: Arc<str> = Arc::from(format!("{from:?}"));
        let to_name: Arc<str> = Arc::from(format!("{target:?}"));

        self.bus.publish(
            Event::new(EventKind::StateChanging)
                .with_source(self.name.clone())
                .with_states(from_name.clone(), to_name.clone())
                .with_error_opt(error.clone()),
        );

        if target != self.initial && target != self.idle && self.busy.start() {
            self.bus
                .publish(Event::new(EventKind::MachineStarted).with_source(self.name.clone()));
        }

        *self.current.write().expect("state lock poisoned") = target;

        if target == self.idle && self.may_stop() && self.busy.stop() {
            self.bus
                .publish(Event::new(EventKind::MachineStopped).with_source(self.name.clone()));
        }

        self.bus.publish(
            Event::new(EventKind::StateChanged)
                .with_source(self.name.clone())
                .with_states(from_name, to_name)
                .with_error_opt(error),
        );
    }

    fn may_stop(&self) -> bool {
        self.gate
            .read()
            .expect("gate lock poisoned")
            .as_ref()
            .map(|g| g.is_stopping())
            .unwrap_or(true)
    }

    /// Subscribes the machine to a source bus.
    ///
    /// Spawns a listener forwarding that bus's events into
    /// [`StateMachine::handle_event`]. The returned token detaches it; the
    /// listener also exits on its own once the machine is dropped.
    pub fn register_source(&self, bus: &Bus) -> CancellationToken {
        let token = CancellationToken::new();
        let guard = token.clone();
        let mut rx = bus.subscribe();
        let machine = self.weak_self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(ev) => {
                            let Some(machine) = machine.upgrade() else {
                                break;
                            };
                            machine.handle_event(&ev).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        self.sources
            .lock()
            .expect("sources lock poisoned")
            .push(token.clone());
        token
    }

    /// True while a busy run is in progress.
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Busy edges as a watch channel.
    pub fn busy_watch(&self) -> watch::Receiver<bool> {
        self.busy.watch()
    }

    /// Waits until the machine's busy run ends.
    pub async fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        self.busy.wait_idle(timeout).await
    }

    /// Machine name (the `source` of its events).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bus this machine publishes on.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

impl<S: State> Drop for StateMachine<S> {
    fn drop(&mut self) {
        for token in self.sources.lock().expect("sources lock poisoned").iter() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::engine::{TaskEngine, TaskResult, TaskWorker};
    use crate::machine::triggers::EventTrigger;
    use crate::queue::{DrainFn, QueueConsumer};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Phase {
        Pending,
        Running,
        Idle,
    }

    fn machine() -> Arc<StateMachine<Phase>> {
        StateMachine::new("machine", Bus::new(128), Phase::Pending, Phase::Idle)
    }

    #[test]
    fn starts_at_initial() {
        // Construction is runtime-free.
        let m = StateMachine::new("m", Bus::new(8), Phase::Pending, Phase::Idle);
        assert_eq!(m.current(), Phase::Pending);
        assert!(!m.is_busy());
    }

    #[tokio::test]
    async fn matching_trigger_transitions_and_tracks_busy() {
        let m = machine();
        m.register_state_triggers(vec![
            StateTrigger::new(
                EventTrigger::on_kind("start", EventKind::EngineStarted),
                Phase::Running,
            ),
            StateTrigger::new(
                EventTrigger::on_kind("stop", EventKind::EngineStopped),
                Phase::Idle,
            ),
        ]);

        assert_eq!(m.apply_event(&Event::new(EventKind::EngineStarted)), 1);
        assert_eq!(m.current(), Phase::Running);
        assert!(m.is_busy());

        assert_eq!(m.apply_event(&Event::new(EventKind::EngineStopped)), 1);
        assert_eq!(m.current(), Phase::Idle);
        assert!(!m.is_busy());

        // Unmatched events commit nothing.
        assert_eq!(m.apply_event(&Event::new(EventKind::ItemsProduced)), 0);
    }

    #[tokio::test]
    async fn all_matching_triggers_fire_and_last_wins() {
        let m = machine();
        m.register_state_triggers(vec![
            StateTrigger::new(
                EventTrigger::on_kind("first", EventKind::EngineStarted),
                Phase::Running,
            ),
            StateTrigger::new(
                EventTrigger::on_kind("second", EventKind::EngineStarted),
                Phase::Idle,
            ),
        ]);

        let mut rx = m.bus().subscribe();
        assert_eq!(m.apply_event(&Event::new(EventKind::EngineStarted)), 2);
        assert_eq!(m.current(), Phase::Idle);

        let mut changed = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::StateChanged {
                changed += 1;
            }
        }
        assert_eq!(changed, 2);
    }

    #[tokio::test]
    async fn transition_notifications_carry_the_event_error() {
        let m = machine();
        m.register_state_triggers(vec![StateTrigger::new(
            EventTrigger::on_kind("fail", EventKind::EngineStopped),
            Phase::Idle,
        )]);

        let mut rx = m.bus().subscribe();
        m.apply_event(&Event::new(EventKind::EngineStopped).with_error("bad batch"));

        let mut pair = 0;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev.kind, EventKind::StateChanging | EventKind::StateChanged) {
                assert_eq!(ev.error.as_deref(), Some("bad batch"));
                assert_eq!(ev.to.as_deref(), Some("Idle"));
                pair += 1;
            }
        }
        assert_eq!(pair, 2);
    }

    #[tokio::test]
    async fn deregister_and_clear_mutate_the_list() {
        let m = machine();
        m.register_state_triggers(vec![
            StateTrigger::new(
                EventTrigger::on_kind("a", EventKind::EngineStarted),
                Phase::Running,
            ),
            StateTrigger::new(
                EventTrigger::on_kind("b", EventKind::EngineStarted),
                Phase::Running,
            ),
        ]);

        m.deregister_state_triggers(&["a"]);
        assert_eq!(m.apply_event(&Event::new(EventKind::EngineStarted)), 1);

        m.clear_state_triggers();
        assert_eq!(m.apply_event(&Event::new(EventKind::EngineStarted)), 0);
    }

    #[tokio::test]
    async fn stop_gate_vetoes_the_busy_stop() {
        struct Hold(AtomicUsize);
        impl StopGate for Hold {
            fn is_stopping(&self) -> bool {
                self.0.load(Ordering::SeqCst) > 0
            }
        }

        let m = machine();
        let gate = Arc::new(Hold(AtomicUsize::new(0)));
        m.set_stop_gate(gate.clone());
        m.register_state_triggers(vec![
            StateTrigger::new(
                EventTrigger::on_kind("run", EventKind::EngineStarted),
                Phase::Running,
            ),
            StateTrigger::new(
                EventTrigger::on_kind("rest", EventKind::EngineStopped),
                Phase::Idle,
            ),
        ]);

        m.apply_event(&Event::new(EventKind::EngineStarted));
        m.apply_event(&Event::new(EventKind::EngineStopped));
        // Gate said no: state is Idle but the run continues.
        assert_eq!(m.current(), Phase::Idle);
        assert!(m.is_busy());

        gate.0.store(1, Ordering::SeqCst);
        m.apply_event(&Event::new(EventKind::EngineStopped));
        assert!(!m.is_busy());
    }

    /// Driving an engine with N items through a machine with a start- and a
    /// stop-trigger yields exactly one transition to the running state and
    /// one to the idle state, in that order, for any N.
    #[tokio::test]
    async fn engine_driven_machine_transitions_exactly_once_each_way() {
        struct Echo;

        #[async_trait]
        impl TaskWorker for Echo {
            type Directive = u32;
            type Output = u32;

            async fn consume(&self, directive: u32) -> TaskResult<u32, u32> {
                TaskResult::success(directive, directive)
            }
        }

        let sink = DrainFn::arc(|mut consumer: QueueConsumer<TaskResult<u32, u32>>| async move {
            while consumer.consume_next().is_some() {}
            Ok(())
        });
        let engine = TaskEngine::new("echo", Config::default(), Arc::new(Echo), sink);

        let m = machine();
        m.register_state_triggers(vec![
            StateTrigger::new(
                EventTrigger::on_source_kind("engine-start", "echo", EventKind::EngineStarted),
                Phase::Running,
            ),
            StateTrigger::new(
                EventTrigger::on_source_kind("engine-stop", "echo", EventKind::EngineStopped),
                Phase::Idle,
            ),
        ]);
        let mut rx = m.bus().subscribe();
        m.register_source(engine.bus());

        for i in 0..40u32 {
            engine.queue_task(i).await.expect("queue_task");
        }
        assert!(engine.wait_idle(Some(Duration::from_secs(10))).await);
        assert!(m.wait_idle(Some(Duration::from_secs(10))).await);

        let transitions = tokio::time::timeout(Duration::from_secs(5), async {
            let mut seen = Vec::new();
            loop {
                let ev = rx.recv().await.expect("bus open");
                if ev.kind == EventKind::StateChanged {
                    seen.push(ev.to.as_deref().map(str::to_string));
                    if ev.to.as_deref() == Some("Idle") {
                        break seen;
                    }
                }
            }
        })
        .await
        .expect("transitions observed");

        assert_eq!(
            transitions,
            vec![Some("Running".to_string()), Some("Idle".to_string())]
        );
        assert_eq!(m.current(), Phase::Idle);
    }
}
