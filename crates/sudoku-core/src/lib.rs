//! Sudoku Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Async runtimes
//! - Channels or transports
//! - The solving algorithm
//!
//! Everything that crosses the worker boundary is defined here, so both
//! sides of the protocol agree on the shape of a grid, a rule set and a
//! timing measurement.

pub mod error;
pub mod ids;
pub mod measure;
pub mod rules;
pub mod status;
pub mod sudoku;

// Re-export commonly used types
pub use error::{CoreError, SolveError};
pub use ids::WorkerId;
pub use measure::{Clock, Mark, Measurement};
pub use rules::{Cage, Rules};
pub use status::WorkerState;
pub use sudoku::{Sudoku, CELLS, SIZE};
