//! # Pull cursor over a producer's queue.
//!
//! [`QueueConsumer`] grants at-most-one-consumer-at-a-time draining
//! semantics: the producer's worker creates one cursor per drain cycle and
//! hands it to the drain handler, so there is never a second consumer racing
//! for the same batch.
//!
//! ## Rules
//! - [`QueueConsumer::consume_next`] dequeues under the queue's own lock and
//!   wakes one producer blocked on backpressure per dequeued item.
//! - Draining the queue to empty publishes `ItemsConsumed` once and returns
//!   `None`; `current` keeps the last successfully dequeued item.
//! - Once the queue is canceled, `consume_next` returns `None` without an
//!   event, leaving the remaining items recoverable from the producer.

use std::sync::Arc;

use crate::events::{Event, EventKind};
use crate::queue::producer::Shared;

/// Pull cursor handed to a drain handler, one per drain cycle.
///
/// Holds the most recently dequeued item (`current`), cursor semantics: it is
/// only replaced by the next *successful* [`QueueConsumer::consume_next`].
pub struct QueueConsumer<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
    current: Option<T>,
}

impl<T: Clone + Send + 'static> QueueConsumer<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        Self {
            shared,
            current: None,
        }
    }

    /// Attempts to dequeue one item.
    ///
    /// - On success: stores a clone as [`QueueConsumer::current`], wakes one
    ///   backpressured producer, and returns the item.
    /// - On empty queue: publishes `ItemsConsumed` and returns `None`
    ///   (`current` is untouched).
    /// - On a canceled queue: returns `None` with no event, so a drain in
    ///   flight winds down promptly and leaves the rest of the batch queued.
    pub fn consume_next(&mut self) -> Option<T> {
        let popped = {
            let mut queue = self.shared.queue.lock().expect("queue lock poisoned");
            if self.shared.is_canceled() {
                return None;
            }
            queue.pop_front()
        };

        match popped {
            Some(item) => {
                self.current = Some(item.clone());
                self.shared.record_cursor(item.clone());
                self.shared.space.notify_one();
                Some(item)
            }
            None => {
                self.shared.bus.publish(
                    Event::new(EventKind::ItemsConsumed).with_source(self.shared.name.clone()),
                );
                None
            }
        }
    }

    /// The most recently dequeued item of this cycle, if any.
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Number of items still queued.
    pub fn pending_count(&self) -> usize {
        self.shared.len()
    }
}
