//! Command and event messages.

use serde::{Deserialize, Serialize};
use sudoku_core::{Measurement, Rules, SolveError, Sudoku};

/// Message sent from the orchestrator to a worker runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Load the solver module.
    Init,
    /// Solve a puzzle. `rules: None` means standard sudoku.
    Solve {
        puzzle: Sudoku,
        rules: Option<Rules>,
    },
    /// Abort the solve in progress, if any.
    Cancel,
    /// Stop the worker.
    Terminate,
}

impl Command {
    /// Wire tag of this command.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Solve { .. } => "solve",
            Self::Cancel => "cancel",
            Self::Terminate => "terminate",
        }
    }
}

/// Message sent from a worker runtime to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Solver module loaded; the worker accepts `Solve`.
    Ready,
    /// Opaque, non-decreasing progress of the current solve.
    Progress { value: f64 },
    /// Terminal event of a successful solve.
    Solved {
        solution: Sudoku,
        measurement: Measurement,
    },
    /// The solver module could not be loaded. The worker is unusable.
    LoadFailed { message: String },
    /// Terminal event of a failed solve. The worker stays usable.
    SolveFailed { error: SolveError },
    /// A command arrived in a state that does not accept it.
    Rejected {
        command: String,
        reason: RejectReason,
    },
    /// Terminal event of a cancelled solve.
    Aborted,
}

impl Event {
    /// Wire tag of this event.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Progress { .. } => "progress",
            Self::Solved { .. } => "solved",
            Self::LoadFailed { .. } => "load_failed",
            Self::SolveFailed { .. } => "solve_failed",
            Self::Rejected { .. } => "rejected",
            Self::Aborted => "aborted",
        }
    }

    /// Returns true if this event ends a solve.
    pub fn is_terminal_for_solve(&self) -> bool {
        matches!(
            self,
            Self::Solved { .. } | Self::SolveFailed { .. } | Self::Aborted
        )
    }
}

/// Why a command was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The solver module is not loaded yet.
    NotReady,
    /// A solve is already in progress.
    Busy,
    /// The solver module failed to load.
    LoadFailed,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotReady => "solver not ready",
            Self::Busy => "a solve is already in progress",
            Self::LoadFailed => "solver failed to load",
        };
        f.write_str(s)
    }
}
