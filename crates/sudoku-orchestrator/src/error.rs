//! Error types for the orchestrator.

use sudoku_core::SolveError;
use sudoku_proto::RejectReason;
use sudoku_worker::WorkerError;
use thiserror::Error;

/// Errors surfaced to the interface layer and to callers of the orchestrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    /// The solver engine never became ready: load failure or ready timeout.
    #[error("Solver engine failed to load: {0}")]
    Load(String),

    /// The channel to the worker was severed.
    #[error("Worker channel closed: {0}")]
    Channel(String),

    /// A solve was requested before the worker reported `Ready`.
    #[error("Solver is not ready")]
    NotReady,

    /// A solve was requested while another one is outstanding.
    #[error("A solve is already in progress")]
    SolveInFlight,

    /// The worker rejected a command.
    #[error("Worker rejected {command}: {reason}")]
    ProtocolViolation {
        command: String,
        reason: RejectReason,
    },

    /// The puzzle could not be solved. The worker stays usable.
    #[error("Puzzle could not be solved: {0}")]
    Solve(#[from] SolveError),
}

impl OrchestratorError {
    /// Returns true if the worker can no longer be used and must be restarted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Load(_) | Self::Channel(_))
    }
}

impl From<WorkerError> for OrchestratorError {
    fn from(e: WorkerError) -> Self {
        Self::Channel(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_solve_messages_differ() {
        let load = OrchestratorError::Load("artifact missing".to_string());
        let solve = OrchestratorError::Solve(SolveError::Unsatisfiable);

        assert!(load.to_string().starts_with("Solver engine failed to load"));
        assert!(solve.to_string().starts_with("Puzzle could not be solved"));
        assert!(load.is_fatal());
        assert!(!solve.is_fatal());
    }

    #[test]
    fn test_from_worker_error() {
        let err: OrchestratorError = WorkerError::ChannelClosed.into();
        assert_eq!(
            err,
            OrchestratorError::Channel("Worker channel closed".to_string())
        );
    }
}
