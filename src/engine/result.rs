//! # Classified task results.
//!
//! Every directive a [`TaskEngine`](crate::TaskEngine) drains yields exactly
//! one [`TaskResult`], even on failure. Classification is three-valued:
//!
//! - [`ResultState::Success`] — the directive produced a value
//! - [`ResultState::Empty`] — the directive completed with nothing to report
//! - [`ResultState::Error`] — the directive failed
//!
//! The invariant `state == Error ⇔ error is present` is enforced by the
//! constructors; build results through them rather than by struct literal.

use std::sync::Arc;

/// Three-valued classification of a directive's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultState {
    /// The directive produced a value.
    Success,
    /// The directive completed with nothing to report.
    Empty,
    /// The directive failed; `error` carries the failure text.
    Error,
}

/// Outcome of one directive.
///
/// Carries the directive itself so downstream consumers can correlate results
/// with their inputs without extra bookkeeping.
#[derive(Debug, Clone)]
pub struct TaskResult<D, R> {
    /// The directive this result answers.
    pub directive: D,
    /// The produced value, for `Success` results.
    pub value: Option<R>,
    /// Failure text, for `Error` results.
    pub error: Option<Arc<str>>,
    /// Classification.
    pub state: ResultState,
}

impl<D, R> TaskResult<D, R> {
    /// A successful result carrying a value.
    pub fn success(directive: D, value: R) -> Self {
        Self {
            directive,
            value: Some(value),
            error: None,
            state: ResultState::Success,
        }
    }

    /// A completed-but-empty result.
    pub fn empty(directive: D) -> Self {
        Self {
            directive,
            value: None,
            error: None,
            state: ResultState::Empty,
        }
    }

    /// A failed result carrying the failure text.
    pub fn error(directive: D, error: impl Into<Arc<str>>) -> Self {
        Self {
            directive,
            value: None,
            error: Some(error.into()),
            state: ResultState::Error,
        }
    }

    /// True for `Error` results.
    pub fn is_error(&self) -> bool {
        self.state == ResultState::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_uphold_the_error_invariant() {
        let ok: TaskResult<u32, &str> = TaskResult::success(1, "value");
        assert_eq!(ok.state, ResultState::Success);
        assert!(ok.error.is_none());

        let empty: TaskResult<u32, &str> = TaskResult::empty(2);
        assert_eq!(empty.state, ResultState::Empty);
        assert!(empty.value.is_none() && empty.error.is_none());

        let failed: TaskResult<u32, &str> = TaskResult::error(3, "boom");
        assert!(failed.is_error());
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
