//! Task engines: classified directive → result pipelines.
//!
//! ## Contents
//! - [`TaskWorker`] — the user seam: classify each directive's outcome
//! - [`TaskResult`], [`ResultState`] — the three-valued classification
//! - [`TaskEngine`] — two bounded queues around one worker, with metrics
//! - [`EngineCounters`], [`CounterSnapshot`] — aggregate bookkeeping
//!
//! ## Quick wiring
//! ```text
//! TaskEngine::new(name, cfg, worker, result_handler)
//!      ├─ queue_task(directive).await     — gate, count, backpressure
//!      ├─ counters() / progress() / tasks_per_second()
//!      └─ cancel / wait_idle / set_max_queue_length
//! ```

mod counters;
mod result;
mod task;

pub use counters::{CounterSnapshot, EngineCounters};
pub use result::{ResultState, TaskResult};
pub use task::{TaskEngine, TaskWorker};
