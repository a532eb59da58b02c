//! Sudoku Orchestrator
//!
//! Runs on the interface side. It owns one worker at a time, sends it
//! commands and dispatches the worker's events to an [`Interface`]
//! implementation: progress while a puzzle is being solved, then the
//! solution and its measurement.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sudoku_orchestrator::{ChannelInterface, Notification, Orchestrator};
//! use sudoku_solver::BuiltinLoader;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (interface, mut notifications) = ChannelInterface::new();
//! let mut orchestrator = Orchestrator::new(Arc::new(BuiltinLoader::new()), Arc::new(interface));
//! orchestrator.start()?;
//!
//! let solver = orchestrator.ready().await?;
//! solver.solve(
//!     "53..7....6..195....98....6.8...6...34..8.3..17...2...6.6....28....419..5....8..79".parse()?,
//!     None,
//! )?;
//!
//! while let Some(notification) = notifications.recv().await {
//!     match notification {
//!         Notification::Solved(grid) => println!("{}", grid),
//!         Notification::Measured(m) => {
//!             println!("{}", m);
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! orchestrator.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod interface;
mod orchestrator;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use interface::{ChannelInterface, Interface, Notification, SolveTrigger};
pub use orchestrator::Orchestrator;
