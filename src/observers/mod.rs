//! Observers: passive event handlers fed by bounded fan-out.
//!
//! ## Contents
//! - [`Observe`] — the observer contract (name, queue capacity, `on_event`)
//! - [`ObserverSet`] — per-observer bounded queues + workers, panic isolation
//! - [`LogWriter`] — stdout formatting of every event kind (`logging`
//!   feature)
//!
//! ## Quick wiring
//! ```text
//! let set = Arc::new(ObserverSet::new(observers, bus.clone()));
//! let pump = set.attach(&bus);     — forwards the bus into the set
//! // ... later: pump.cancel(); set.shutdown().await;
//! ```

mod observe;
mod set;

#[cfg(feature = "logging")]
mod log;

pub use observe::Observe;
pub use set::ObserverSet;

#[cfg(feature = "logging")]
pub use log::LogWriter;
