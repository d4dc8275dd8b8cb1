//! Error types used by the conveyor runtime.
//!
//! One crate-wide [`Error`] enum covers the whole taxonomy:
//!
//! - [`Error::Aborted`] — a mutating operation reached a canceled component.
//!   Expected control flow, always recoverable by the caller.
//! - [`Error::QueueAborted`] — a drain handler failed while a queue was being
//!   drained; the owning producer is canceled. The typed payload (offending
//!   item plus every still-pending item) stays with the producer and is
//!   recoverable via `ItemProducer::take_abort`.
//! - [`Error::InvalidOperation`] — a precondition was not met (command
//!   pre-flight, aggregate pre-flight).
//! - [`Error::InvalidArgument`] — a rejected directive.
//!
//! Panics are the unclassified tier: they are first captured into a failure
//! notification on the owning component's bus, and only then allowed to
//! resume unwinding where the call site demands it.
//!
//! Helper methods (`as_label`, `as_message`) provide stable strings for
//! logs/metrics.

use thiserror::Error;

/// # Errors produced by the conveyor runtime.
///
/// Every fallible public operation in the crate returns this type. Variants
/// carry the name of the component that raised them so errors remain
/// attributable after they cross an event bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Operation attempted on a canceled component.
    ///
    /// Carries the last drain error observed before cancellation, if any,
    /// so a producer blocked on backpressure learns *why* the queue died.
    #[error("component '{component}' is canceled{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Aborted {
        /// Name of the canceled component.
        component: String,
        /// Last failure observed before cancellation, if any.
        reason: Option<String>,
    },

    /// A drain handler failed; the owning queue has been canceled.
    ///
    /// `pending` counts the items that were still queued when the abort
    /// happened. The items themselves (and the offending one) are held by the
    /// producer and retrievable via `take_abort`, so no work is silently lost.
    #[error("queue '{component}' aborted while draining ({pending} pending): {reason}")]
    QueueAborted {
        /// Name of the aborted queue.
        component: String,
        /// Failure that broke the drain cycle.
        reason: String,
        /// Number of items left undelivered.
        pending: usize,
    },

    /// A precondition was not met.
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Which precondition failed.
        reason: String,
    },

    /// A directive was rejected by the worker's validity gate.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Why the directive was rejected.
        reason: String,
    },
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use conveyor::Error;
    ///
    /// let err = Error::aborted("directives", None);
    /// assert_eq!(err.as_label(), "aborted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::Aborted { .. } => "aborted",
            Error::QueueAborted { .. } => "queue_aborted",
            Error::InvalidOperation { .. } => "invalid_operation",
            Error::InvalidArgument { .. } => "invalid_argument",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// Shorthand for [`Error::Aborted`].
    pub fn aborted(component: impl Into<String>, reason: Option<String>) -> Self {
        Error::Aborted {
            component: component.into(),
            reason,
        }
    }

    /// Shorthand for [`Error::InvalidOperation`].
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Error::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// True for [`Error::Aborted`] and [`Error::QueueAborted`] — the caller
    /// reached a component that is shutting down, not a usage bug.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted { .. } | Error::QueueAborted { .. })
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(Error::aborted("q", None).as_label(), "aborted");
        assert_eq!(
            Error::QueueAborted {
                component: "q".into(),
                reason: "boom".into(),
                pending: 3,
            }
            .as_label(),
            "queue_aborted"
        );
        assert_eq!(
            Error::invalid_operation("nope").as_label(),
            "invalid_operation"
        );
        assert_eq!(
            Error::invalid_argument("empty").as_label(),
            "invalid_argument"
        );
    }

    #[test]
    fn aborted_message_carries_reason() {
        let bare = Error::aborted("directives", None);
        assert_eq!(bare.as_message(), "component 'directives' is canceled");

        let with_reason = Error::aborted("directives", Some("handler failed".into()));
        assert!(with_reason.as_message().contains("handler failed"));
    }

    #[test]
    fn abort_classification() {
        assert!(Error::aborted("q", None).is_abort());
        assert!(!Error::invalid_operation("x").is_abort());
    }
}
