//! Core domain errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core domain errors for parsing and validating domain values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Grid input does not hold exactly 81 cells.
    #[error("Invalid grid length: expected 81 cells, got {0}")]
    InvalidLength(usize),

    /// A cell holds a value outside `0..=9`.
    #[error("Invalid value {value} in cell {index}")]
    InvalidCell { index: usize, value: u8 },

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Rule set is malformed.
    #[error("Invalid rules: {0}")]
    InvalidRules(String),
}

/// Reasons a solver can reject or fail to complete a puzzle.
///
/// This is the recoverable failure of a single solve: the worker reports it
/// and goes back to accepting puzzles. It travels over the wire, so it is
/// serializable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SolveError {
    /// The givens already break a constraint.
    #[error("Invalid puzzle: {0}")]
    InvalidPuzzle(String),

    /// The rule set cannot be applied to a 9x9 grid.
    #[error("Invalid rules: {0}")]
    InvalidRules(String),

    /// Search finished without finding a solution.
    #[error("Puzzle has no solution")]
    Unsatisfiable,

    /// The solver faulted internally.
    #[error("Solver fault: {0}")]
    Internal(String),
}

impl From<CoreError> for SolveError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidRules(msg) => Self::InvalidRules(msg),
            other => Self::InvalidPuzzle(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_error_wire_shape() {
        let json = serde_json::to_value(SolveError::InvalidPuzzle("row 1".into())).unwrap();
        assert_eq!(json["kind"], "invalid_puzzle");
        assert_eq!(json["detail"], "row 1");

        let json = serde_json::to_value(SolveError::Unsatisfiable).unwrap();
        assert_eq!(json["kind"], "unsatisfiable");
    }

    #[test]
    fn test_core_error_maps_to_solve_error() {
        let err: SolveError = CoreError::InvalidRules("empty cage".into()).into();
        assert_eq!(err, SolveError::InvalidRules("empty cage".into()));

        let err: SolveError = CoreError::InvalidLength(80).into();
        assert!(matches!(err, SolveError::InvalidPuzzle(_)));
    }
}
