//! # Non-blocking event fan-out to multiple observers.
//!
//! [`ObserverSet`] distributes events to multiple observers concurrently
//! without blocking the publisher — the reimplementation of multicast
//! notification as per-subscriber bounded channels registered at
//! construction time.
//!
//! ## Architecture
//! ```text
//! emit(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► observer1.on_event()
//!     │    (bounded)         └──────► panic → ObserverPanicked
//!     ├──► [queue 2] ──► worker 2 ──► observer2.on_event()
//!     └──► [queue N] ──► worker N ──► observerN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-observer ordering**: observer A may process event N while B
//!   processes N+5; each observer sees its own events in FIFO order.
//! - **Overflow**: the event is dropped for that observer only and an
//!   `ObserverOverflow` is published (observer noise is never re-fanned-out,
//!   so overflow cannot feed on itself).
//! - **Isolation**: a slow or panicking observer never prevents the others
//!   from running; panics are caught, reported as `ObserverPanicked`, and the
//!   worker continues.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::panic_text;
use crate::events::{Bus, Event};
use crate::observers::observe::Observe;

/// Per-observer channel metadata.
struct ObserverChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event observers.
pub struct ObserverSet {
    channels: Vec<ObserverChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl ObserverSet {
    /// Creates the set and spawns one worker task per observer.
    ///
    /// `bus` is where overflow/panic noise is reported (usually the same bus
    /// the set observes).
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(observers.len());
        let mut workers = Vec::with_capacity(observers.len());

        for observer in observers {
            let capacity = observer.queue_capacity().max(1);
            let name = observer.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(capacity);
            let bus_for_worker = bus.clone();

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let handled = AssertUnwindSafe(observer.on_event(ev.as_ref()))
                        .catch_unwind()
                        .await;
                    if let Err(payload) = handled {
                        bus_for_worker.publish(Event::observer_panicked(
                            observer.name(),
                            panic_text(payload.as_ref()),
                        ));
                    }
                }
            });
            channels.push(ObserverChannel { name, sender: tx });
            workers.push(handle);
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    /// Emits an event to all observers (clones it into an `Arc`).
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Emits a pre-allocated `Arc<Event>` to all observers.
    ///
    /// Never blocks: uses `try_send`; a full or closed queue drops the event
    /// for that observer only and reports `ObserverOverflow`.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let noise = event.is_observer_noise();
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    if !noise {
                        self.bus
                            .publish(Event::observer_overflow(channel.name, "full"));
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    if !noise {
                        self.bus
                            .publish(Event::observer_overflow(channel.name, "closed"));
                    }
                }
            }
        }
    }

    /// Spawns a pump forwarding a bus into this set.
    ///
    /// Consumes this `Arc` handle (clone it first to keep one for
    /// [`ObserverSet::shutdown`]). The returned token detaches the pump.
    pub fn attach(self: Arc<Self>, bus: &Bus) -> CancellationToken {
        let token = CancellationToken::new();
        let guard = token.clone();
        let mut rx = bus.subscribe();
        let set = self;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(ev) => set.emit_arc(Arc::new(ev)),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
        token
    }

    /// Gracefully shuts down all observer workers.
    ///
    /// 1. Drops all channel senders (workers see their queue closed)
    /// 2. Awaits all worker tasks
    pub async fn shutdown(self) {
        drop(self.channels);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::events::EventKind;

    struct Counter {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Observe for Counter {
        async fn on_event(&self, _event: &Event) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    struct Faulty;

    #[async_trait]
    impl Observe for Faulty {
        async fn on_event(&self, event: &Event) {
            if event.kind == EventKind::ItemsProduced {
                panic!("observer tripped");
            }
        }
        fn name(&self) -> &'static str {
            "faulty"
        }
    }

    #[tokio::test]
    async fn every_observer_sees_every_event() {
        let bus = Bus::new(64);
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let set = Arc::new(ObserverSet::new(
            vec![
                Arc::new(Counter { seen: a.clone() }),
                Arc::new(Counter { seen: b.clone() }),
            ],
            bus.clone(),
        ));
        let _pump = set.attach(&bus);

        for _ in 0..10 {
            bus.publish(Event::new(EventKind::ItemsConsumed));
        }

        let both = tokio::time::timeout(Duration::from_secs(5), async {
            while a.load(Ordering::SeqCst) < 10 || b.load(Ordering::SeqCst) < 10 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
        assert!(both.is_ok());
    }

    #[tokio::test]
    async fn a_panicking_observer_does_not_stop_its_peers() {
        let bus = Bus::new(64);
        let seen = Arc::new(AtomicUsize::new(0));
        let set = Arc::new(ObserverSet::new(
            vec![
                Arc::new(Faulty),
                Arc::new(Counter { seen: seen.clone() }),
            ],
            bus.clone(),
        ));
        let _pump = set.attach(&bus);
        let mut rx = bus.subscribe();

        bus.publish(Event::new(EventKind::ItemsProduced));
        bus.publish(Event::new(EventKind::ItemsConsumed));

        let peer_ok = tokio::time::timeout(Duration::from_secs(5), async {
            while seen.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
        assert!(peer_ok.is_ok());

        let panic_reported = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let ev = rx.recv().await.expect("bus open");
                if ev.kind == EventKind::ObserverPanicked {
                    assert!(ev.is_from("faulty"));
                    break;
                }
            }
        })
        .await;
        assert!(panic_reported.is_ok());
    }
}
