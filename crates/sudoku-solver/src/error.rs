//! Error types for solver modules.

use sudoku_core::SolveError;
use thiserror::Error;

/// Errors that can occur while loading or running a solver module.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The module could not be loaded or initialised.
    #[error("Solver module failed to load: {0}")]
    LoadFailed(String),

    /// The solve was cancelled through its reporter.
    #[error("Solve cancelled")]
    Cancelled,

    /// The puzzle was rejected or could not be completed.
    #[error(transparent)]
    Solve(#[from] SolveError),
}
