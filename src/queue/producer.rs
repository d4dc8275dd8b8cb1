//! # Bounded FIFO producer with backpressure and a dedicated draining worker.
//!
//! [`ItemProducer`] is the base unit of backpressure and of the busy/idle
//! lifecycle. It holds one FIFO queue, blocks producers once the queue is at
//! capacity, and runs exactly one background worker for its whole lifetime.
//!
//! ## Architecture
//! ```text
//! produce() ──► [FIFO queue, soft cap max_length] ──► worker task
//!    ▲                                                  │
//!    │  blocked while pending ≥ max_length              │ per cycle:
//!    └── woken per dequeued item / on cancel            │  publish ItemsProduced (≥1 item, once)
//!                                                       │  handler.drain(QueueConsumer)
//!                                                       │  await handler = "drain in flight"
//!                                                       ▼
//!                                            queue empty → ProducerStopped
//!                                            handler error → abort + cancel
//! ```
//!
//! ## Rules
//! - **FIFO end-to-end**: produce order = drain order.
//! - **One signal per cycle**: `ItemsProduced` fires once per drain cycle and
//!   never observes an empty queue.
//! - **Errors never escape the worker**: a handler error or panic is captured
//!   into a [`QueueAbort`] record (offending item + every pending item),
//!   cancels the queue, and surfaces as `ProducerStopped` carrying the error.
//! - **Cancellation is terminal**: a canceled producer refuses all new work
//!   with [`Error::Aborted`] and cannot be restarted.
//! - A stuck handler is accepted risk; there is no internal watchdog.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{watch, Notify};

use crate::config::Config;
use crate::error::{panic_text, Error};
use crate::events::{Bus, Event, EventKind};
use crate::lifecycle::BusyFlag;
use crate::queue::consumer::QueueConsumer;
use crate::queue::handler::DrainHandler;

/// Captured state of an aborted drain: the item whose handling failed plus
/// every item that was still queued, so no work is silently lost.
#[derive(Debug)]
pub struct QueueAbort<T> {
    /// The item being handled when the drain failed, if one was dequeued.
    pub item: Option<T>,
    /// Items left undelivered, in FIFO order.
    pub pending: Vec<T>,
    /// Why the drain failed.
    pub reason: String,
}

/// State shared between the producer handle, its worker, and cursors.
pub(crate) struct Shared<T> {
    pub(crate) name: Arc<str>,
    pub(crate) bus: Bus,
    pub(crate) queue: Mutex<VecDeque<T>>,
    pub(crate) space: Notify,
    items: Notify,
    canceled: AtomicBool,
    max_length: AtomicUsize,
    added: AtomicU64,
    busy: BusyFlag,
    abort: Mutex<Option<QueueAbort<T>>>,
    cursor: Mutex<Option<T>>,
}

impl<T: Clone + Send + 'static> Shared<T> {
    pub(crate) fn is_canceled(&self) -> bool {
        self.canceled.load(AtomicOrdering::Acquire)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.lock().expect("queue lock poisoned").len()
    }

    /// Remembers the most recently dequeued item for abort attribution.
    pub(crate) fn record_cursor(&self, item: T) {
        *self.cursor.lock().expect("cursor lock poisoned") = Some(item);
    }

    fn aborted_error(&self) -> Error {
        let reason = self
            .abort
            .lock()
            .expect("abort lock poisoned")
            .as_ref()
            .map(|a| a.reason.clone());
        Error::aborted(self.name.as_ref(), reason)
    }

    /// Captures the failed drain, cancels the queue, and wakes every waiter.
    fn record_failure(&self, reason: String) {
        let pending: Vec<T> = {
            let mut queue = self.queue.lock().expect("queue lock poisoned");
            queue.drain(..).collect()
        };
        let item = self.cursor.lock().expect("cursor lock poisoned").take();
        *self.abort.lock().expect("abort lock poisoned") = Some(QueueAbort {
            item,
            pending,
            reason,
        });
        self.request_cancel();
    }

    fn request_cancel(&self) {
        self.canceled.store(true, AtomicOrdering::Release);
        // Wake registered waiters plus one armed-but-unpolled straggler;
        // woken producers chain-wake the rest.
        self.space.notify_waiters();
        self.space.notify_one();
        self.items.notify_one();
    }

    fn exit_info(&self) -> (Option<Arc<str>>, usize) {
        let abort = self.abort.lock().expect("abort lock poisoned");
        match abort.as_ref() {
            Some(a) => {
                let err = Error::QueueAborted {
                    component: self.name.to_string(),
                    reason: a.reason.clone(),
                    pending: a.pending.len(),
                };
                (Some(Arc::from(err.as_message())), a.pending.len())
            }
            None => (None, 0),
        }
    }
}

/// Bounded FIFO queue plus one dedicated draining worker.
///
/// Created once, lives for the duration of the owning process stage. All
/// methods are callable from any task; `produce` may wait on backpressure.
pub struct ItemProducer<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> ItemProducer<T> {
    /// Creates the producer and spawns its draining worker.
    ///
    /// Must be called from within a tokio runtime. The handler is invoked
    /// once per drain cycle with a fresh [`QueueConsumer`]; see
    /// [`DrainHandler`] for the failure contract.
    pub fn new(
        name: impl Into<Arc<str>>,
        cfg: Config,
        bus: Bus,
        handler: Arc<dyn DrainHandler<T>>,
    ) -> Arc<Self> {
        let shared = Arc::new(Shared {
            name: name.into(),
            bus,
            queue: Mutex::new(VecDeque::new()),
            space: Notify::new(),
            items: Notify::new(),
            canceled: AtomicBool::new(false),
            max_length: AtomicUsize::new(cfg.queue_length_clamped()),
            added: AtomicU64::new(0),
            busy: BusyFlag::new(),
            abort: Mutex::new(None),
            cursor: Mutex::new(None),
        });

        tokio::spawn(Self::drain_loop(Arc::clone(&shared), handler));
        Arc::new(Self { shared })
    }

    /// The dedicated worker: one per producer, for its whole lifetime.
    async fn drain_loop(shared: Arc<Shared<T>>, handler: Arc<dyn DrainHandler<T>>) {
        loop {
            let wakeup = shared.items.notified();
            if shared.is_canceled() {
                break;
            }
            let len = shared.len();
            if len == 0 {
                wakeup.await;
                continue;
            }

            // Items are available and no drain is in flight: signal once.
            shared.bus.publish(
                Event::new(EventKind::ItemsProduced)
                    .with_source(shared.name.clone())
                    .with_pending(len),
            );

            let consumer = QueueConsumer::new(Arc::clone(&shared));
            let outcome = AssertUnwindSafe(handler.drain(consumer)).catch_unwind().await;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.as_message()),
                Err(payload) => Some(panic_text(payload.as_ref())),
            };

            if let Some(reason) = failure {
                shared.record_failure(reason);
                break;
            }

            if shared.len() == 0 && shared.busy.stop() {
                shared
                    .bus
                    .publish(Event::new(EventKind::ProducerStopped).with_source(shared.name.clone()));
            }
        }

        // Canceled (externally or by a failed drain): end the busy run once.
        let (error, pending) = shared.exit_info();
        if shared.busy.stop() {
            let mut ev = Event::new(EventKind::ProducerStopped)
                .with_source(shared.name.clone())
                .with_error_opt(error);
            if pending > 0 {
                ev = ev.with_pending(pending);
            }
            shared.bus.publish(ev);
        }
    }

    /// Appends an item, waiting on backpressure while the queue is full.
    ///
    /// Fails with [`Error::Aborted`] once the producer is canceled — the
    /// error carries the last drain failure, if one caused the cancellation.
    /// Appending to an empty queue starts the busy lifecycle
    /// (`ProducerStarted`) and wakes the worker.
    pub async fn produce(&self, item: T) -> Result<(), Error> {
        let shared = &self.shared;
        if shared.is_canceled() {
            return Err(shared.aborted_error());
        }
        shared.added.fetch_add(1, AtomicOrdering::Relaxed);

        let mut item = Some(item);
        loop {
            // Arm before checking so a wakeup between the check and the await
            // is never lost.
            let slot = shared.space.notified();
            {
                let mut queue = shared.queue.lock().expect("queue lock poisoned");
                if shared.is_canceled() {
                    drop(queue);
                    shared.space.notify_one(); // chain-wake the next blocked producer
                    return Err(shared.aborted_error());
                }
                if queue.len() < shared.max_length.load(AtomicOrdering::Relaxed) {
                    let was_empty = queue.is_empty();
                    queue.push_back(item.take().expect("item already consumed"));
                    drop(queue);

                    if was_empty && shared.busy.start() {
                        shared.bus.publish(
                            Event::new(EventKind::ProducerStarted)
                                .with_source(shared.name.clone()),
                        );
                    }
                    shared.items.notify_one();
                    return Ok(());
                }
            }
            slot.await;
        }
    }

    /// Cancels the producer and waits for the busy run to end.
    ///
    /// Idempotent. Returns whether the producer went idle within `timeout`
    /// (`None` waits without bound). The cancellation request is never rolled
    /// back: the producer stays canceled even when this returns `false`.
    pub async fn cancel(&self, timeout: Option<Duration>) -> bool {
        self.shared.request_cancel();
        self.shared.busy.wait_idle(timeout).await
    }

    /// The non-waiting half of [`ItemProducer::cancel`]: flips the canceled
    /// flag and wakes all waiters.
    pub fn abort(&self) {
        self.shared.request_cancel();
    }

    /// Waits until the producer is idle (not mid-run).
    pub async fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        self.shared.busy.wait_idle(timeout).await
    }

    /// Current queue depth.
    pub fn pending_count(&self) -> usize {
        self.shared.len()
    }

    /// Lifetime count of accepted `produce` calls.
    pub fn added_count(&self) -> u64 {
        self.shared.added.load(AtomicOrdering::Relaxed)
    }

    /// Current soft capacity.
    pub fn max_length(&self) -> usize {
        self.shared.max_length.load(AtomicOrdering::Relaxed)
    }

    /// Updates the soft capacity (clamped to ≥ 1) and wakes backpressured
    /// producers so a raised limit takes effect immediately.
    pub fn set_max_length(&self, max_length: usize) {
        self.shared
            .max_length
            .store(max_length.max(1), AtomicOrdering::Relaxed);
        self.shared.space.notify_waiters();
    }

    /// True once the producer has started a busy run that has not ended.
    pub fn is_busy(&self) -> bool {
        self.shared.busy.is_busy()
    }

    /// Busy edges as a watch channel, for composition.
    pub fn busy_watch(&self) -> watch::Receiver<bool> {
        self.shared.busy.watch()
    }

    /// True once canceled (terminal).
    pub fn is_canceled(&self) -> bool {
        self.shared.is_canceled()
    }

    /// Snapshot of the items still queued, in FIFO order.
    pub fn pending_items(&self) -> Vec<T> {
        self.shared
            .queue
            .lock()
            .expect("queue lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Takes the abort record of a failed drain, if one happened.
    pub fn take_abort(&self) -> Option<QueueAbort<T>> {
        self.shared.abort.lock().expect("abort lock poisoned").take()
    }

    /// Reason and pending count of a failed drain, if one happened.
    ///
    /// A peek: the typed record stays available for
    /// [`ItemProducer::take_abort`].
    pub fn abort_info(&self) -> Option<(String, usize)> {
        self.shared
            .abort
            .lock()
            .expect("abort lock poisoned")
            .as_ref()
            .map(|a| (a.reason.clone(), a.pending.len()))
    }

    /// Producer name (the `source` of its events).
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The bus this producer publishes on.
    pub fn bus(&self) -> &Bus {
        &self.shared.bus
    }
}

impl<T: Clone + Send + 'static> Drop for ItemProducer<T> {
    fn drop(&mut self) {
        // Let the worker task exit instead of sleeping on a dead queue.
        self.shared.request_cancel();
    }
}
