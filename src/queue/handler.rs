//! # Drain handler seam and function-backed implementation.
//!
//! A [`DrainHandler`] is what a producer's dedicated worker invokes once per
//! drain cycle: it receives a fresh [`QueueConsumer`] cursor and is expected
//! to pull items with `consume_next` until it decides to stop (usually on
//! `None`). The worker awaits the handler, so "the consumer is still
//! draining" and "the handler has not returned yet" are the same thing.
//!
//! [`DrainFn`] wraps a closure `F: Fn(QueueConsumer<T>) -> Fut`, producing a
//! fresh future per drain cycle. This avoids shared mutable state; if a
//! handler needs state across cycles, capture an `Arc<...>` explicitly inside
//! the closure.
//!
//! ## Failure contract
//! Returning `Err` (or panicking) from `drain` aborts the owning queue: the
//! offending item and every still-pending item are captured into a
//! [`QueueAbort`](crate::queue::QueueAbort) record and the producer is
//! canceled.
//!
//! ## Example
//! ```rust
//! use conveyor::{DrainFn, Error, QueueConsumer};
//!
//! let handler = DrainFn::arc(|mut consumer: QueueConsumer<u32>| async move {
//!     while let Some(item) = consumer.consume_next() {
//!         // process item...
//!         let _ = item;
//!     }
//!     Ok::<_, Error>(())
//! });
//! # let _ = handler;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::queue::consumer::QueueConsumer;

/// # Per-cycle drain callback.
///
/// Invoked by the producer's worker with a fresh cursor each time items
/// become available. Implementations run outside all queue locks; they may be
/// slow without blocking producers beyond the configured backpressure.
#[async_trait]
pub trait DrainHandler<T>: Send + Sync + 'static
where
    T: Clone + Send + 'static,
{
    /// Drains available items through the cursor.
    ///
    /// Returning `Err` aborts the owning queue (see module docs).
    async fn drain(&self, consumer: QueueConsumer<T>) -> Result<(), Error>;
}

/// Function-backed drain handler.
///
/// Wraps a closure that *creates* a new future per drain cycle.
#[derive(Debug)]
pub struct DrainFn<F> {
    f: F,
}

impl<F> DrainFn<F> {
    /// Creates a new function-backed handler.
    ///
    /// Prefer [`DrainFn::arc`] when you immediately need an
    /// `Arc<dyn DrainHandler<T>>`.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the handler and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<T, F, Fut> DrainHandler<T> for DrainFn<F>
where
    T: Clone + Send + 'static,
    F: Fn(QueueConsumer<T>) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    async fn drain(&self, consumer: QueueConsumer<T>) -> Result<(), Error> {
        (self.f)(consumer).await
    }
}
