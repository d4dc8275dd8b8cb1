//! # Busy/idle lifecycle primitives.
//!
//! Every component in conveyor that does background work — producers, engines,
//! state machines, controllers — exposes the same busy/idle contract: a run
//! begins when work arrives, ends when the component drains back to rest, and
//! anyone can wait for the idle edge with an optional timeout.
//!
//! Two small primitives carry that contract:
//! - [`BusyFlag`] — a `watch`-backed boolean with edge-detecting `start`/`stop`
//!   and a timed [`BusyFlag::wait_idle`].
//! - [`RunClock`] — accumulates elapsed busy time across runs, the denominator
//!   of every `tasks_per_second` metric.
//!
//! ## Rules
//! - `start`/`stop` are idempotent; only genuine edges return `true`.
//! - `wait_idle(None)` waits forever; `wait_idle(Some(d))` returns `false` on
//!   timeout without consuming the waiter's position.
//! - Watch receivers obtained from [`BusyFlag::watch`] observe every edge and
//!   can be composed with `tokio::select!` (engines compose two producer
//!   flags this way).

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time;

/// Watch-backed busy/idle flag.
///
/// Cheap to share behind an `Arc`; readers either poll [`BusyFlag::is_busy`]
/// or subscribe via [`BusyFlag::watch`] for edge-driven composition.
#[derive(Debug)]
pub struct BusyFlag {
    tx: watch::Sender<bool>,
}

impl BusyFlag {
    /// Creates a new flag in the idle state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Marks the flag busy. Returns `true` only on the idle→busy edge.
    pub fn start(&self) -> bool {
        let mut started = false;
        self.tx.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                started = true;
                true
            }
        });
        started
    }

    /// Marks the flag idle. Returns `true` only on the busy→idle edge.
    pub fn stop(&self) -> bool {
        let mut stopped = false;
        self.tx.send_if_modified(|busy| {
            if *busy {
                *busy = false;
                stopped = true;
                true
            } else {
                false
            }
        });
        stopped
    }

    /// Current state.
    pub fn is_busy(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribes to busy edges.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Waits until the flag is idle.
    ///
    /// Returns `true` once idle is observed, `false` if `timeout` elapsed
    /// first. `None` waits without bound.
    pub async fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let mut rx = self.tx.subscribe();
        let wait = async {
            // wait_for also checks the current value before awaiting changes.
            let _ = rx.wait_for(|busy| !*busy).await;
        };
        match timeout {
            None => {
                wait.await;
                true
            }
            Some(d) => time::timeout(d, wait).await.is_ok(),
        }
    }
}

impl Default for BusyFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates elapsed busy time across runs.
///
/// `start`/`stop` bracket each busy run; [`RunClock::elapsed`] returns the
/// total including the in-flight run, so throughput reads are live.
#[derive(Debug)]
pub struct RunClock {
    state: Mutex<ClockState>,
}

#[derive(Debug)]
struct ClockState {
    running_since: Option<Instant>,
    accumulated: Duration,
}

impl RunClock {
    /// Creates a stopped clock with zero accumulated time.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                running_since: None,
                accumulated: Duration::ZERO,
            }),
        }
    }

    /// Starts a run. No-op if already running.
    pub fn start(&self) {
        let mut st = self.state.lock().expect("clock lock poisoned");
        if st.running_since.is_none() {
            st.running_since = Some(Instant::now());
        }
    }

    /// Ends the current run, folding it into the accumulated total.
    pub fn stop(&self) {
        let mut st = self.state.lock().expect("clock lock poisoned");
        if let Some(since) = st.running_since.take() {
            st.accumulated += since.elapsed();
        }
    }

    /// Total busy time, including the in-flight run.
    pub fn elapsed(&self) -> Duration {
        let st = self.state.lock().expect("clock lock poisoned");
        match st.running_since {
            Some(since) => st.accumulated + since.elapsed(),
            None => st.accumulated,
        }
    }

    /// Completed units divided by elapsed busy seconds (0.0 while the clock
    /// has never run).
    pub fn rate(&self, completed: u64) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            completed as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for RunClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_edges_are_detected_once() {
        let flag = BusyFlag::new();
        assert!(!flag.is_busy());
        assert!(flag.start());
        assert!(!flag.start());
        assert!(flag.is_busy());
        assert!(flag.stop());
        assert!(!flag.stop());
        assert!(!flag.is_busy());
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_idle() {
        let flag = BusyFlag::new();
        assert!(flag.wait_idle(Some(Duration::from_millis(10))).await);
    }

    #[tokio::test]
    async fn wait_idle_times_out_while_busy() {
        let flag = BusyFlag::new();
        flag.start();
        assert!(!flag.wait_idle(Some(Duration::from_millis(20))).await);
    }

    #[tokio::test]
    async fn wait_idle_observes_stop_edge() {
        let flag = std::sync::Arc::new(BusyFlag::new());
        flag.start();
        let waiter = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.wait_idle(Some(Duration::from_secs(5))).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.stop();
        assert!(waiter.await.expect("waiter panicked"));
    }

    #[test]
    fn clock_accumulates_only_while_running() {
        let clock = RunClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert_eq!(clock.rate(100), 0.0);

        clock.start();
        std::thread::sleep(Duration::from_millis(5));
        clock.stop();
        let after_run = clock.elapsed();
        assert!(after_run >= Duration::from_millis(5));

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.elapsed(), after_run);
        assert!(clock.rate(10) > 0.0);
    }
}
