//! Run state machine
//!
//! `Created -> ViewsReady -> (Bound -> Dispatched -> Barriered -> Mapped -> Compared -> Unmapped)* -> ReportFinalized`,
//! with `Aborted` reachable from any non-terminal state on a fatal error.

use std::fmt;

/// State of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Backing store built and uploaded
    Created,
    /// All views created
    ViewsReady,
    /// View and result buffer bound to the kernel
    Bound,
    /// Kernel dispatched
    Dispatched,
    /// Memory barrier passed; results visible to the host
    Barriered,
    /// Result buffer mapped for reading
    Mapped,
    /// Results compared against expected values
    Compared,
    /// Result buffer unmapped
    Unmapped,
    /// Aggregate report built (terminal)
    ReportFinalized,
    /// Run aborted by a fatal error (terminal)
    Aborted,
}

impl RunState {
    /// Returns true for states that end a run
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::ReportFinalized | RunState::Aborted)
    }

    /// Returns true if `next` may follow `self`
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (from, Aborted) => !from.is_terminal(),
            (Created, ViewsReady) => true,
            (ViewsReady | Unmapped, Bound) => true,
            (ViewsReady | Unmapped, ReportFinalized) => true,
            (Bound, Dispatched) | (Dispatched, Barriered) | (Barriered, Mapped) | (Mapped, Compared) | (Compared, Unmapped) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Records the states a run passes through
#[derive(Debug, Default, Clone)]
pub struct RunTracker {
    history: Vec<RunState>,
}

impl RunTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves to `state`
    pub fn enter(&mut self, state: RunState) {
        if let Some(current) = self.current() {
            debug_assert!(current.can_transition_to(state), "invalid run state transition {current} -> {state}");
        }
        tracing::trace!(%state, "run state");
        self.history.push(state);
    }

    /// Current state, if the run has started
    pub fn current(&self) -> Option<RunState> {
        self.history.last().copied()
    }

    /// Every state entered so far, in order
    pub fn history(&self) -> &[RunState] {
        &self.history
    }
}
