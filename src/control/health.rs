//! # Process health: monotonically escalating failure classification.
//!
//! [`ProcessHealth`] summarizes whether any supervised component has failed:
//!
//! - [`ProcessHealth::Nominal`] — nothing failed
//! - [`ProcessHealth::TaskError`] — some task-level work failed (a registered
//!   engine reported failed results or stopped with an error)
//! - [`ProcessHealth::ProcessError`] — the process itself degraded (a failed
//!   controller transition or a command failure)
//!
//! Escalation is strictly monotonic within a run; a new run begins when the
//! owner explicitly resets the latch.

use std::sync::atomic::{AtomicU8, Ordering as AtomicOrdering};

/// Health classification, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessHealth {
    /// No supervised component has failed.
    Nominal,
    /// Task-level failures were observed; the process keeps running.
    TaskError,
    /// The process itself degraded (failed transition or command).
    ProcessError,
}

impl ProcessHealth {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ProcessHealth::Nominal,
            1 => ProcessHealth::TaskError,
            _ => ProcessHealth::ProcessError,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ProcessHealth::Nominal => 0,
            ProcessHealth::TaskError => 1,
            ProcessHealth::ProcessError => 2,
        }
    }
}

/// Atomic, escalate-only health latch.
#[derive(Debug, Default)]
pub(crate) struct HealthCell(AtomicU8);

impl HealthCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ProcessHealth::Nominal.as_u8()))
    }

    /// Raises the health to `to` if it is more severe than the current value.
    pub(crate) fn escalate(&self, to: ProcessHealth) {
        self.0.fetch_max(to.as_u8(), AtomicOrdering::AcqRel);
    }

    /// Current classification.
    pub(crate) fn current(&self) -> ProcessHealth {
        ProcessHealth::from_u8(self.0.load(AtomicOrdering::Acquire))
    }

    /// Back to `Nominal` (a new run begins).
    pub(crate) fn reset(&self) {
        self.0
            .store(ProcessHealth::Nominal.as_u8(), AtomicOrdering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_is_monotonic() {
        let cell = HealthCell::new();
        assert_eq!(cell.current(), ProcessHealth::Nominal);

        cell.escalate(ProcessHealth::TaskError);
        assert_eq!(cell.current(), ProcessHealth::TaskError);

        // De-escalation attempts are ignored.
        cell.escalate(ProcessHealth::Nominal);
        assert_eq!(cell.current(), ProcessHealth::TaskError);

        cell.escalate(ProcessHealth::ProcessError);
        assert_eq!(cell.current(), ProcessHealth::ProcessError);
        cell.escalate(ProcessHealth::TaskError);
        assert_eq!(cell.current(), ProcessHealth::ProcessError);
    }

    #[test]
    fn reset_begins_a_new_run() {
        let cell = HealthCell::new();
        cell.escalate(ProcessHealth::ProcessError);
        cell.reset();
        assert_eq!(cell.current(), ProcessHealth::Nominal);
    }

    #[test]
    fn severity_ordering_matches_escalation() {
        assert!(ProcessHealth::Nominal < ProcessHealth::TaskError);
        assert!(ProcessHealth::TaskError < ProcessHealth::ProcessError);
    }
}
