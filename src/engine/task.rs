//! # TaskEngine: directive → result pipeline.
//!
//! A [`TaskEngine`] composes two [`ItemProducer`]s — directives in, classified
//! results out — around a user-supplied [`TaskWorker`]. It is the unit
//! end-users implement to define actual work.
//!
//! ## Architecture
//! ```text
//! queue_task(directive)
//!     │  (validity gate, total += 1, backpressure)
//!     ▼
//! [directive ItemProducer] ── worker task ──► TaskWorker::consume(directive)
//!                                                  │  classify: Success / Empty / Error
//!                                                  │  tally exactly one bucket
//!                                                  ▼
//!                            [result ItemProducer] ── worker task ──► result handler
//! ```
//!
//! ## Rules
//! - **One result per directive**, even on failure: a panicking worker yields
//!   a synthesized `Error` result and the drain continues.
//! - **A drain-loop escape aborts the engine**: if publishing a result fails
//!   (the result queue died), the directive queue aborts, every undelivered
//!   directive is counted failed, and `EngineStopped` carries the error.
//! - **Lifecycle**: busy starts when either internal producer starts; stops
//!   only when both are idle. Rapid busy edges may coalesce into one run.
//! - **Cancellation is terminal**: `cancel` cancels both internal producers;
//!   a canceled engine silently drops new directives.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;

use crate::config::Config;
use crate::engine::counters::{CounterSnapshot, EngineCounters};
use crate::engine::result::TaskResult;
use crate::error::{panic_text, Error};
use crate::events::{Bus, Event, EventKind};
use crate::lifecycle::BusyFlag;
use crate::queue::{DrainHandler, ItemProducer, QueueAbort, QueueConsumer};

/// # User-supplied work function with classification.
///
/// The engine serializes `consume` calls (single draining worker per stage),
/// so result order equals directive order as long as `consume` does not fan
/// out internally.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use conveyor::{TaskResult, TaskWorker};
///
/// struct Doubler;
///
/// #[async_trait]
/// impl TaskWorker for Doubler {
///     type Directive = u32;
///     type Output = u32;
///
///     async fn consume(&self, directive: u32) -> TaskResult<u32, u32> {
///         TaskResult::success(directive, directive * 2)
///     }
/// }
/// ```
#[async_trait]
pub trait TaskWorker: Send + Sync + 'static {
    /// Input item type.
    type Directive: Clone + Send + 'static;
    /// Value type of successful results.
    type Output: Clone + Send + 'static;

    /// Validity gate for incoming directives.
    ///
    /// A rejected directive makes `queue_task` fail with
    /// [`Error::InvalidArgument`] without touching any counter.
    fn accepts(&self, directive: &Self::Directive) -> bool {
        let _ = directive;
        true
    }

    /// Processes one directive into a classified result.
    ///
    /// A panic here is contained: the engine synthesizes an `Error` result
    /// for the directive and keeps draining.
    async fn consume(&self, directive: Self::Directive)
        -> TaskResult<Self::Directive, Self::Output>;
}

/// Drain handler bridging the directive queue to the worker and the result
/// queue. One instance per engine, owned by the directive producer.
struct EngineDrain<W: TaskWorker> {
    name: Arc<str>,
    bus: Bus,
    worker: Arc<W>,
    counters: Arc<EngineCounters>,
    results: Arc<ItemProducer<TaskResult<W::Directive, W::Output>>>,
}

#[async_trait]
impl<W: TaskWorker> DrainHandler<W::Directive> for EngineDrain<W> {
    async fn drain(&self, mut consumer: QueueConsumer<W::Directive>) -> Result<(), Error> {
        while let Some(directive) = consumer.consume_next() {
            let attempt =
                AssertUnwindSafe(self.worker.consume(directive.clone())).catch_unwind().await;
            let result = match attempt {
                Ok(result) => result,
                Err(payload) => TaskResult::error(directive, panic_text(payload.as_ref())),
            };

            self.counters.record(result.state);
            if let Some(error) = result.error.clone() {
                self.bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_source(self.name.clone())
                        .with_error(error),
                );
            }

            // A failed publish means the result stage died: escape the drain
            // loop and let the abort path account for the rest.
            self.results.produce(result).await?;
        }
        Ok(())
    }
}

/// Directive → result pipeline with classification and aggregate metrics.
pub struct TaskEngine<W: TaskWorker> {
    name: Arc<str>,
    bus: Bus,
    worker: Arc<W>,
    directives: Arc<ItemProducer<W::Directive>>,
    results: Arc<ItemProducer<TaskResult<W::Directive, W::Output>>>,
    counters: Arc<EngineCounters>,
    busy: Arc<BusyFlag>,
}

impl<W: TaskWorker> TaskEngine<W> {
    /// Creates the engine: its own bus, both internal producers, and the
    /// lifecycle monitor. Must be called from within a tokio runtime.
    ///
    /// `result_handler` drains the result queue; it is the other end of the
    /// pipeline and runs under the same abort contract as any drain handler.
    pub fn new(
        name: impl Into<Arc<str>>,
        cfg: Config,
        worker: Arc<W>,
        result_handler: Arc<dyn DrainHandler<TaskResult<W::Directive, W::Output>>>,
    ) -> Arc<Self> {
        let name: Arc<str> = name.into();
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let counters = Arc::new(EngineCounters::new());

        let results = ItemProducer::new(
            format!("{name}.results"),
            cfg.clone(),
            bus.clone(),
            result_handler,
        );
        let drain = Arc::new(EngineDrain {
            name: name.clone(),
            bus: bus.clone(),
            worker: Arc::clone(&worker),
            counters: Arc::clone(&counters),
            results: Arc::clone(&results),
        });
        let directives = ItemProducer::new(format!("{name}.directives"), cfg, bus.clone(), drain);

        let busy = Arc::new(BusyFlag::new());
        tokio::spawn(Self::monitor(
            name.clone(),
            bus.clone(),
            Arc::clone(&directives),
            Arc::clone(&results),
            Arc::clone(&counters),
            Arc::clone(&busy),
        ));

        Arc::new(Self {
            name,
            bus,
            worker,
            directives,
            results,
            counters,
            busy,
        })
    }

    /// Composes the two producers' busy flags into the engine lifecycle:
    /// first busy → `EngineStarted` + clock start; both idle →
    /// `EngineStopped` (+ abort bookkeeping) + clock stop.
    async fn monitor(
        name: Arc<str>,
        bus: Bus,
        directives: Arc<ItemProducer<W::Directive>>,
        results: Arc<ItemProducer<TaskResult<W::Directive, W::Output>>>,
        counters: Arc<EngineCounters>,
        busy: Arc<BusyFlag>,
    ) {
        let mut d_rx = directives.busy_watch();
        let mut r_rx = results.busy_watch();
        loop {
            let now_busy = *d_rx.borrow() || *r_rx.borrow();
            if now_busy {
                if busy.start() {
                    counters.clock().start();
                    bus.publish(Event::new(EventKind::EngineStarted).with_source(name.clone()));
                }
            } else if busy.stop() {
                counters.clock().stop();

                let mut error: Option<Arc<str>> = None;
                let mut failed_pending = 0usize;
                if let Some((reason, pending)) = directives.abort_info() {
                    // Drain-loop escape: undelivered directives count failed
                    // and the sibling stage is torn down with this one.
                    failed_pending = pending;
                    counters.add_failed(pending as u64);
                    error = Some(Arc::from(format!("directive drain aborted: {reason}")));
                    results.abort();
                } else if let Some((reason, _)) = results.abort_info() {
                    error = Some(Arc::from(format!("result drain aborted: {reason}")));
                    directives.abort();
                }

                let mut ev = Event::new(EventKind::EngineStopped)
                    .with_source(name.clone())
                    .with_error_opt(error);
                if failed_pending > 0 {
                    ev = ev.with_pending(failed_pending);
                }
                bus.publish(ev);
            }

            tokio::select! {
                changed = d_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = r_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Queues one directive.
    ///
    /// - [`Error::InvalidArgument`] if the worker's validity gate rejects it.
    /// - Silently dropped (Ok, no counter change) once the engine is canceled.
    /// - Otherwise increments `total_tasks` and forwards to the directive
    ///   queue; waits on backpressure when that queue is full.
    pub async fn queue_task(&self, directive: W::Directive) -> Result<(), Error> {
        if !self.worker.accepts(&directive) {
            return Err(Error::invalid_argument(format!(
                "directive rejected by '{}'",
                self.name
            )));
        }
        if self.directives.is_canceled() {
            return Ok(());
        }
        self.counters.add_total(1);
        self.directives.produce(directive).await
    }

    /// Cancels both internal producers and waits for the engine to go idle.
    ///
    /// Idempotent; returns whether both stages went idle within `timeout`.
    pub async fn cancel(&self, timeout: Option<Duration>) -> bool {
        let d = self.directives.cancel(timeout);
        let r = self.results.cancel(timeout);
        let (d_idle, r_idle) = tokio::join!(d, r);
        d_idle && r_idle
    }

    /// The non-waiting half of [`TaskEngine::cancel`]: flips both internal
    /// producers' canceled flags and wakes their waiters.
    pub fn abort_stages(&self) {
        self.directives.abort();
        self.results.abort();
    }

    /// Waits until both internal producers are idle.
    pub async fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        self.busy.wait_idle(timeout).await
    }

    /// True while either internal producer is mid-run.
    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Engine-level busy edges, for composition.
    pub fn busy_watch(&self) -> watch::Receiver<bool> {
        self.busy.watch()
    }

    /// True once canceled (terminal).
    pub fn is_canceled(&self) -> bool {
        self.directives.is_canceled()
    }

    /// One consistent view of all counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot(self.directives.pending_count())
    }

    /// Directives ever queued.
    pub fn total_tasks(&self) -> u64 {
        self.counters().total
    }

    /// Directive queue depth.
    pub fn waiting_tasks(&self) -> usize {
        self.directives.pending_count()
    }

    /// `successful + empty + failed`.
    pub fn completed_tasks(&self) -> u64 {
        self.counters().completed
    }

    /// Results classified `Success`.
    pub fn successful_results(&self) -> u64 {
        self.counters().successful
    }

    /// Results classified `Empty`.
    pub fn empty_results(&self) -> u64 {
        self.counters().empty
    }

    /// Results classified `Error`, plus directives failed by an abort.
    pub fn failed_results(&self) -> u64 {
        self.counters().failed
    }

    /// `completed / total`, 0 when nothing was queued.
    pub fn progress(&self) -> f64 {
        self.counters().progress
    }

    /// Completed directives per elapsed busy second.
    pub fn tasks_per_second(&self) -> f64 {
        self.counters().tasks_per_second
    }

    /// Current soft capacity of the internal queues.
    pub fn max_queue_length(&self) -> usize {
        self.directives.max_length()
    }

    /// Updates the soft capacity of **both** internal queues uniformly.
    pub fn set_max_queue_length(&self, max_queue_length: usize) {
        self.directives.set_max_length(max_queue_length);
        self.results.set_max_length(max_queue_length);
    }

    /// Takes the directive queue's abort record, if a drain failed.
    pub fn take_abort(&self) -> Option<QueueAbort<W::Directive>> {
        self.directives.take_abort()
    }

    /// Takes the result queue's abort record, if the result drain failed.
    pub fn take_result_abort(
        &self,
    ) -> Option<QueueAbort<TaskResult<W::Directive, W::Output>>> {
        self.results.take_abort()
    }

    /// Engine name (the `source` of its lifecycle events).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bus this engine and its internal producers publish on.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::queue::DrainFn;

    /// Classifies by residue: 0 → success, 1 → empty, 2 → error.
    struct Modulo;

    #[async_trait]
    impl TaskWorker for Modulo {
        type Directive = u64;
        type Output = u64;

        fn accepts(&self, directive: &u64) -> bool {
            *directive != u64::MAX
        }

        async fn consume(&self, directive: u64) -> TaskResult<u64, u64> {
            match directive % 3 {
                0 => TaskResult::success(directive, directive * 2),
                1 => TaskResult::empty(directive),
                _ => TaskResult::error(directive, "residue two"),
            }
        }
    }

    fn counting_handler<D, R>(
        counter: Arc<AtomicUsize>,
    ) -> Arc<dyn DrainHandler<TaskResult<D, R>>>
    where
        D: Clone + Send + 'static,
        R: Clone + Send + 'static,
    {
        DrainFn::arc(move |mut consumer: QueueConsumer<TaskResult<D, R>>| {
            let counter = counter.clone();
            async move {
                while consumer.consume_next().is_some() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn conservation_holds_for_every_classification() {
        const ITEMS: u64 = 500;

        let drained = Arc::new(AtomicUsize::new(0));
        let engine = TaskEngine::new(
            "modulo",
            Config::default(),
            Arc::new(Modulo),
            counting_handler(drained.clone()),
        );

        let mut rx = engine.bus().subscribe();
        for i in 0..ITEMS {
            engine.queue_task(i).await.expect("queue_task");
        }
        assert!(engine.wait_idle(Some(Duration::from_secs(10))).await);

        let snap = engine.counters();
        assert_eq!(snap.total, ITEMS);
        assert_eq!(snap.successful + snap.empty + snap.failed, ITEMS);
        assert_eq!(snap.completed, ITEMS);
        assert_eq!(snap.waiting, 0);
        assert!((snap.progress - 1.0).abs() < f64::EPSILON);
        assert_eq!(drained.load(Ordering::SeqCst), ITEMS as usize);

        // Exactly one lifecycle start and one stop, in order.
        let lifecycle = tokio::time::timeout(Duration::from_secs(5), async {
            let mut seen = Vec::new();
            loop {
                let ev = rx.recv().await.expect("bus open");
                if matches!(ev.kind, EventKind::EngineStarted | EventKind::EngineStopped) {
                    seen.push(ev.kind);
                    if ev.kind == EventKind::EngineStopped {
                        break seen;
                    }
                }
            }
        })
        .await
        .expect("lifecycle events");
        assert_eq!(lifecycle, vec![EventKind::EngineStarted, EventKind::EngineStopped]);
    }

    #[tokio::test]
    async fn rejected_directive_fails_without_counting() {
        let engine = TaskEngine::new(
            "gate",
            Config::default(),
            Arc::new(Modulo),
            counting_handler(Arc::new(AtomicUsize::new(0))),
        );

        let err = engine.queue_task(u64::MAX).await.expect_err("rejected");
        assert_eq!(err.as_label(), "invalid_argument");
        assert_eq!(engine.total_tasks(), 0);
    }

    #[tokio::test]
    async fn canceled_engine_silently_drops_new_directives() {
        let engine = TaskEngine::new(
            "dropped",
            Config::default(),
            Arc::new(Modulo),
            counting_handler(Arc::new(AtomicUsize::new(0))),
        );
        assert!(engine.cancel(Some(Duration::from_secs(5))).await);

        engine.queue_task(3).await.expect("dropped, not an error");
        assert_eq!(engine.total_tasks(), 0);
        assert!(engine.is_canceled());
    }

    #[tokio::test]
    async fn worker_panic_is_contained_as_error_result() {
        struct Panicky;

        #[async_trait]
        impl TaskWorker for Panicky {
            type Directive = u32;
            type Output = u32;

            async fn consume(&self, directive: u32) -> TaskResult<u32, u32> {
                if directive == 2 {
                    panic!("boom on two");
                }
                TaskResult::success(directive, directive)
            }
        }

        let drained = Arc::new(AtomicUsize::new(0));
        let engine = TaskEngine::new(
            "panicky",
            Config::default(),
            Arc::new(Panicky),
            counting_handler(drained.clone()),
        );
        for i in 0..5u32 {
            engine.queue_task(i).await.expect("queue_task");
        }
        assert!(engine.wait_idle(Some(Duration::from_secs(5))).await);

        let snap = engine.counters();
        assert_eq!(snap.total, 5);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.successful, 4);
        // The panicking directive still produced a (synthesized) result.
        assert_eq!(drained.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn result_stage_failure_aborts_engine_and_accounts_pending() {
        const ITEMS: u64 = 10;

        // Result handler refuses its first result; the stage dies.
        let poison: Arc<dyn DrainHandler<TaskResult<u64, u64>>> =
            DrainFn::arc(|_consumer: QueueConsumer<TaskResult<u64, u64>>| async move {
                Err(Error::invalid_operation("result sink is closed"))
            });
        let engine = TaskEngine::new("aborting", Config::default(), Arc::new(Modulo), poison);

        let mut rx = engine.bus().subscribe();
        for i in 0..ITEMS {
            engine.queue_task(i).await.expect("queue_task");
        }

        // The monitor publishes EngineStopped after all abort bookkeeping;
        // waiting for it makes every assertion below race-free.
        let stop = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let ev = rx.recv().await.expect("bus open");
                if ev.kind == EventKind::EngineStopped {
                    break ev;
                }
            }
        })
        .await
        .expect("stop notification");
        assert!(stop.is_failure());

        // Conservation still holds: every directive was either classified or
        // counted failed by the abort bookkeeping.
        let snap = engine.counters();
        assert_eq!(snap.total, ITEMS);
        assert_eq!(snap.successful + snap.empty + snap.failed, ITEMS);
        assert_eq!(snap.waiting, 0);

        // The engine is terminally canceled and silently drops new work.
        assert!(engine.is_canceled());
        engine.queue_task(1).await.expect("silently dropped");
        assert_eq!(engine.total_tasks(), ITEMS);
    }

    #[tokio::test]
    async fn max_queue_length_fans_out_to_both_stages() {
        let engine = TaskEngine::new(
            "fanout",
            Config {
                max_queue_length: 8,
                bus_capacity: 64,
            },
            Arc::new(Modulo),
            counting_handler(Arc::new(AtomicUsize::new(0))),
        );
        assert_eq!(engine.max_queue_length(), 8);

        engine.set_max_queue_length(0);
        assert_eq!(engine.max_queue_length(), 1);

        engine.set_max_queue_length(16);
        assert_eq!(engine.max_queue_length(), 16);
    }

    #[tokio::test]
    async fn task_failed_events_match_error_results() {
        let engine = TaskEngine::new(
            "failures",
            Config::default(),
            Arc::new(Modulo),
            counting_handler(Arc::new(AtomicUsize::new(0))),
        );

        let mut rx = engine.bus().subscribe();
        for i in 0..9u64 {
            engine.queue_task(i).await.expect("queue_task");
        }
        assert!(engine.wait_idle(Some(Duration::from_secs(5))).await);

        let mut task_failures = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::TaskFailed {
                assert!(ev.is_failure());
                task_failures += 1;
            }
        }
        // Residues 2, 5, 8.
        assert_eq!(task_failures, 3);
        assert_eq!(engine.counters().failed, 3);
    }
}


