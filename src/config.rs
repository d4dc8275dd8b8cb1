//! # Global runtime configuration.
//!
//! Provides [`Config`] — centralized settings shared by queue-backed
//! components (producers, engines, controllers).
//!
//! Config is used in two ways:
//! 1. **Component creation**: `ItemProducer::new(name, cfg, ..)`,
//!    `TaskEngine::new(name, cfg, ..)`, `ProcessController::new(name, cfg, ..)`
//! 2. **Backpressure tuning**: `max_queue_length` is the only externally
//!    tunable backpressure parameter and can also be changed at runtime via
//!    `set_max_length` / `set_max_queue_length`.
//!
//! ## Sentinel values
//! - `max_queue_length` is clamped to a minimum of 1 (a zero-capacity queue
//!   would deadlock every producer).
//! - `bus_capacity` is clamped to a minimum of 1 (enforced by `Bus`).

/// Shared configuration for queue-backed components.
///
/// ## Field semantics
/// - `max_queue_length`: soft FIFO capacity; producers over this limit are
///   *blocked* on backpressure, never rejected (min 1; clamped)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by `Bus`)
#[derive(Clone, Debug)]
pub struct Config {
    /// Soft capacity of each bounded queue.
    ///
    /// A `produce` call that finds `pending_count >= max_queue_length` waits
    /// on backpressure until a consumer frees a slot or the queue is
    /// canceled. Values below 1 are treated as 1.
    pub max_queue_length: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events will
    /// skip over the oldest items. Minimum value is 1 (enforced by `Bus`).
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_length_clamped(&self) -> usize {
        self.max_queue_length.max(1)
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_queue_length = 1024` (roomy default; tune down to exercise
    ///   backpressure earlier)
    /// - `bus_capacity = 1024` (good baseline for bursty pipelines)
    fn default() -> Self {
        Self {
            max_queue_length: 1024,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_clamp_to_one() {
        let cfg = Config {
            max_queue_length: 0,
            bus_capacity: 0,
        };
        assert_eq!(cfg.queue_length_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn defaults_are_positive() {
        let cfg = Config::default();
        assert!(cfg.max_queue_length >= 1);
        assert!(cfg.bus_capacity >= 1);
    }
}
