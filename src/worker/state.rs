//! Polling-loop state machine.

use crate::error::EngineError;

/// Where a handler's polling loop is within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// Between cycles, sleeping out the poll interval.
    Idle,
    /// Waiting on fetch-and-lock.
    Fetching,
    /// The fetch produced nothing (or failed).
    Empty,
    /// A task lease is held.
    Leased,
    /// The handler is running.
    Executing,
    /// Reporting completion.
    Completing,
    /// Reporting a handler failure.
    Reporting,
}

impl LoopState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: LoopState) -> bool {
        use LoopState::*;

        matches!(
            (self, target),
            (Idle, Fetching) |
            (Fetching, Empty) | (Fetching, Leased) |
            (Empty, Idle) |
            (Leased, Executing) |
            (Executing, Completing) | (Executing, Reporting) |
            (Completing, Idle) | (Reporting, Idle)
        )
    }

    /// True while this loop holds a lease.
    pub fn holds_lease(&self) -> bool {
        matches!(
            self,
            Self::Leased | Self::Executing | Self::Completing | Self::Reporting
        )
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Empty => "empty",
            Self::Leased => "leased",
            Self::Executing => "executing",
            Self::Completing => "completing",
            Self::Reporting => "reporting",
        };
        write!(f, "{s}")
    }
}

/// Result of one polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The engine had nothing for us.
    NoTask,
    /// Fetch-and-lock failed; treated as nothing to do.
    FetchFailed(EngineError),
    /// Handler succeeded and the engine accepted the completion.
    Completed { task_id: String },
    /// Handler succeeded but the engine rejected the completion.
    CompleteRejected { task_id: String, error: EngineError },
    /// Handler failed and the failure was reported.
    FailureReported { task_id: String, message: String },
    /// Handler failed and the engine rejected the failure report.
    FailureRejected {
        task_id: String,
        message: String,
        error: EngineError,
    },
}

impl CycleOutcome {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::NoTask | Self::FetchFailed(_) => None,
            Self::Completed { task_id }
            | Self::CompleteRejected { task_id, .. }
            | Self::FailureReported { task_id, .. }
            | Self::FailureRejected { task_id, .. } => Some(task_id),
        }
    }

    /// True if the handler returned an error this cycle.
    pub fn handler_failed(&self) -> bool {
        matches!(
            self,
            Self::FailureReported { .. } | Self::FailureRejected { .. }
        )
    }
}
