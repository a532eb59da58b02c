//! Lifecycle states of a Worker Runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// State of a Worker Runtime instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    /// Spawned, solver module not requested yet.
    #[default]
    Unloaded,
    /// Solver module is being loaded.
    Loading,
    /// Solver module loaded, accepting puzzles.
    Ready,
    /// A puzzle is being solved.
    Solving,
    /// Solver module failed to load.
    Failed,
    /// Worker stopped. No further transitions.
    Terminated,
}

impl WorkerState {
    /// Returns true if the worker has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Returns true if a `Solve` command would be accepted.
    pub fn can_accept_solve(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if `self -> to` is a legal transition.
    pub fn can_transition_to(&self, to: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, to),
            (Unloaded, Loading)
                | (Loading, Ready)
                | (Loading, Failed)
                | (Ready, Solving)
                | (Solving, Ready)
                | (Unloaded | Loading | Ready | Solving | Failed, Terminated)
        )
    }

    /// Validate and perform a transition.
    pub fn transition(self, to: WorkerState) -> Result<WorkerState, CoreError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CoreError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Solving => "solving",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
