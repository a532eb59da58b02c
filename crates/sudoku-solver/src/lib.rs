//! Solver module contract for the sudoku worker.
//!
//! The worker runtime never knows how a puzzle is solved. It loads a
//! [`SolverModule`] through a [`SolverLoader`] and calls it with a puzzle,
//! an optional rule set and a [`Reporter`] for progress.
//!
//! # Example
//!
//! ```rust,no_run
//! use sudoku_core::Sudoku;
//! use sudoku_solver::{BuiltinLoader, Reporter, SolverLoader};
//!
//! async fn solve_empty() -> Result<(), Box<dyn std::error::Error>> {
//!     let module = BuiltinLoader::new().load().await?;
//!     let mut reporter = Reporter::silent();
//!     let solution = module.solve(&Sudoku::empty(), None, &mut reporter)?;
//!     assert!(solution.is_solved());
//!     Ok(())
//! }
//! ```

mod backtrack;
mod error;
mod loader;
mod module;
mod reporter;

// Re-export main types
pub use backtrack::BacktrackSolver;
pub use error::SolverError;
pub use loader::{BuiltinLoader, UnavailableLoader};
pub use module::{SolverLoader, SolverModule};
pub use reporter::{Reporter, DEFAULT_PROGRESS_STEP};
