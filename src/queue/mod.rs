//! Bounded queues: producer, pull cursor, and drain handlers.
//!
//! This module is the backpressure layer every other component builds on.
//!
//! ## Contents
//! - [`ItemProducer`] — bounded FIFO + one dedicated draining worker
//! - [`QueueConsumer`] — per-cycle pull cursor with `current` semantics
//! - [`DrainHandler`], [`DrainFn`] — the drain callback seam
//! - [`QueueAbort`] — typed capture of a failed drain (nothing is lost)
//!
//! ## Quick wiring
//! ```text
//! ItemProducer::new(name, cfg, bus, handler)
//!      ├─ produce(item).await      — backpressured append
//!      ├─ worker ► handler.drain(QueueConsumer)   — one cycle per signal
//!      └─ cancel / wait_idle / pending_items / take_abort
//! ```

mod consumer;
mod handler;
mod producer;

pub use consumer::QueueConsumer;
pub use handler::{DrainFn, DrainHandler};
pub use producer::{ItemProducer, QueueAbort};
