//! # conveyor
//!
//! **Conveyor** is an embeddable framework for building long-running,
//! event-driven worker processes: bounded task queues with backpressure, a
//! typed directive→result task engine, a trigger-driven state machine, and a
//! process controller that composes many engines into one supervised unit
//! with aggregate metrics and command dispatch.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  queue_task(directive)                            results out
//!        │                                               ▲
//!        ▼                                               │
//! ┌──────────────────────────────────────────────────────┴────────────┐
//! │  TaskEngine (one per workload)                                    │
//! │  - directive ItemProducer (bounded FIFO + draining worker)        │
//! │  - TaskWorker::consume → TaskResult {Success, Empty, Error}       │
//! │  - result ItemProducer → user's DrainHandler                      │
//! │  - counters: total / waiting / completed / progress / rate        │
//! └──────┬────────────────────────────────────────────────────────────┘
//!        │ Bus (broadcast): ProducerStarted/Stopped, ItemsProduced,
//!        │                  EngineStarted/Stopped, TaskFailed, ...
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ProcessController (a StateMachine over registered engines)       │
//! │  - RegisterComponents(role, engines)  → one listener per engine   │
//! │  - StateTriggers: matched events commit transitions               │
//! │  - CommandTriggers: matched events fire Commands                  │
//! │  - aggregates: totals, progress, throughput, ProcessHealth        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! produce(item) ──► [FIFO ≤ max_length, else wait] ──► worker signals
//!                                                      ItemsProduced once
//!                                                      per drain cycle
//! handler drains via QueueConsumer::consume_next()
//!   ├─ Ok, queue empty  ─► ProducerStopped (busy run ends)
//!   └─ Err/panic        ─► QueueAbort{item, pending} + cancel + Stopped(err)
//!
//! StateMachine: initial ──(trigger)──► busy run ──(idle trigger + gate)──► idle
//! Command: Executing ─► run ─► Completed | Failed (panics notify, then resume)
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types / traits                        |
//! |-----------------|----------------------------------------------------------|-------------------------------------------|
//! | **Queues**      | Bounded FIFO, backpressure, abort capture.               | [`ItemProducer`], [`QueueConsumer`]       |
//! | **Engines**     | Classified directive→result pipelines with metrics.      | [`TaskEngine`], [`TaskWorker`]            |
//! | **Machines**    | Trigger-driven FSM with busy lifecycle.                  | [`StateMachine`], [`StateTrigger`]        |
//! | **Control**     | Multi-engine supervision, health, command dispatch.      | [`ProcessController`], [`ProcessEngine`]  |
//! | **Commands**    | Conditional units of work and composites.                | [`Command`], [`AggregateCommand`]         |
//! | **Observers**   | Passive fan-out for logging/metrics.                     | [`Observe`], [`ObserverSet`]              |
//! | **Errors**      | Typed taxonomy with stable labels.                       | [`Error`]                                 |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use conveyor::{Config, DrainFn, QueueConsumer, TaskEngine, TaskResult, TaskWorker};
//!
//! struct Parser;
//!
//! #[async_trait]
//! impl TaskWorker for Parser {
//!     type Directive = String;
//!     type Output = usize;
//!
//!     async fn consume(&self, line: String) -> TaskResult<String, usize> {
//!         match line.trim().len() {
//!             0 => TaskResult::empty(line),
//!             n => TaskResult::success(line, n),
//!         }
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let results = DrainFn::arc(|mut consumer: QueueConsumer<TaskResult<String, usize>>| async move {
//!         while let Some(result) = consumer.consume_next() {
//!             println!("{:?}: {:?}", result.state, result.value);
//!         }
//!         Ok(())
//!     });
//!
//!     let engine = TaskEngine::new("parser", Config::default(), Arc::new(Parser), results);
//!     engine.queue_task("hello world".to_string()).await?;
//!     engine.queue_task("   ".to_string()).await?;
//!
//!     engine.wait_idle(Some(Duration::from_secs(5))).await;
//!     assert_eq!(engine.completed_tasks(), 2);
//!     Ok(())
//! }
//! ```

mod commands;
mod config;
mod control;
mod engine;
mod error;
mod events;
mod lifecycle;
mod machine;
mod observers;
mod queue;

// ---- Public re-exports ----

pub use commands::{AggregateCommand, Command, CommandParam, RelayCommand};
pub use config::Config;
pub use control::{CommandTrigger, ProcessController, ProcessEngine, ProcessHealth, ProcessRole};
pub use engine::{CounterSnapshot, EngineCounters, ResultState, TaskEngine, TaskResult, TaskWorker};
pub use error::Error;
pub use events::{Bus, Event, EventKind};
pub use lifecycle::{BusyFlag, RunClock};
pub use machine::{EventHook, EventTrigger, State, StateMachine, StateTrigger, StopGate};
pub use observers::{Observe, ObserverSet};
pub use queue::{DrainFn, DrainHandler, ItemProducer, QueueAbort, QueueConsumer};

// Optional: expose a simple built-in logger observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;
