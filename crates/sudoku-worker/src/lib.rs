//! Sudoku Worker Runtime
//!
//! An isolated task that owns the solver module. It receives [`Command`]s,
//! loads the module lazily on `Init`, runs solves on a blocking thread and
//! emits [`Event`]s: progress while solving, then exactly one terminal event
//! per solve.
//!
//! [`Command`]: sudoku_proto::Command
//! [`Event`]: sudoku_proto::Event

mod bridge;
mod config;
mod error;
mod runtime;

pub use config::WorkerConfig;
pub use error::WorkerError;
pub use runtime::{CommandSender, WorkerHandle, WorkerRuntime};
