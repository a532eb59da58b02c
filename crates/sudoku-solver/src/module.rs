//! The seams between the worker runtime and a solver implementation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sudoku_core::{Rules, Sudoku};

use crate::error::SolverError;
use crate::reporter::Reporter;

/// A loaded solver.
///
/// `solve` is synchronous and may run for a long time without yielding; the
/// worker calls it from a blocking thread. Implementations should poll
/// [`Reporter::is_cancelled`] now and then and return
/// [`SolverError::Cancelled`] when it is set.
pub trait SolverModule: Send + Sync + fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Solve `puzzle` under `rules` (`None` means standard sudoku).
    ///
    /// Progress values passed to `reporter` must not decrease.
    fn solve(
        &self,
        puzzle: &Sudoku,
        rules: Option<&Rules>,
        reporter: &mut Reporter,
    ) -> Result<Sudoku, SolverError>;
}

/// Produces a solver module, possibly slowly (fetching, compiling, warming up).
///
/// Implement this trait to plug a different solver into the worker.
#[async_trait]
pub trait SolverLoader: Send + Sync {
    /// Load the module. Called at most once per worker.
    async fn load(&self) -> Result<Arc<dyn SolverModule>, SolverError>;
}
