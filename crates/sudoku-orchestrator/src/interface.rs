//! The interface layer seam and the solve trigger handed to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sudoku_core::{Measurement, Rules, Sudoku, WorkerId};
use sudoku_proto::Command;
use sudoku_worker::CommandSender;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::OrchestratorError;

/// Receives what the orchestrator dispatches from the worker.
///
/// Callbacks run on the orchestrator's dispatch task, one at a time and in
/// event order.
#[async_trait]
pub trait Interface: Send + Sync {
    /// Called once the worker is ready, with the value that starts solves.
    async fn set_solver(&self, solver: SolveTrigger);

    /// Called for each progress value of the current solve.
    async fn on_progress(&self, _value: f64) {}

    /// Called exactly once per solved puzzle, with the solution.
    async fn on_solve(&self, solution: Sudoku);

    /// Called exactly once per solved puzzle, right after `on_solve`.
    async fn on_measure(&self, measurement: Measurement);

    /// Called when a solve was cancelled.
    async fn on_aborted(&self) {}

    /// Called for load failures, failed solves and severed channels.
    async fn on_error(&self, error: OrchestratorError);
}

/// Starts solves on the worker.
///
/// Cloneable; every clone talks to the same worker and shares the same
/// outstanding-solve flag. Calls never wait: the command is queued and the
/// result arrives through the [`Interface`] callbacks.
#[derive(Debug, Clone)]
pub struct SolveTrigger {
    sender: CommandSender,
    outstanding: Arc<AtomicBool>,
}

impl SolveTrigger {
    pub(crate) fn new(sender: CommandSender) -> Self {
        Self {
            sender,
            outstanding: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send a `Solve` command. `rules: None` means standard sudoku.
    pub fn solve(&self, puzzle: Sudoku, rules: Option<Rules>) -> Result<(), OrchestratorError> {
        if self.sender.is_closed() {
            self.settle();
            return Err(OrchestratorError::Channel("worker stopped".to_string()));
        }
        if self.outstanding.swap(true, Ordering::AcqRel) {
            return Err(OrchestratorError::SolveInFlight);
        }
        debug!(worker_id = %self.sender.worker_id(), "Sending solve");
        self.sender
            .try_send(Command::Solve { puzzle, rules })
            .map_err(|e| {
                self.outstanding.store(false, Ordering::Release);
                OrchestratorError::from(e)
            })
    }

    /// Ask the worker to abort the current solve. A no-op when idle.
    pub fn cancel(&self) -> Result<(), OrchestratorError> {
        if !self.is_solving() {
            trace!("No solve to cancel");
            return Ok(());
        }
        self.sender.try_send(Command::Cancel)?;
        Ok(())
    }

    /// Returns true while a solve is outstanding.
    pub fn is_solving(&self) -> bool {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn worker_id(&self) -> &WorkerId {
        self.sender.worker_id()
    }

    pub(crate) fn sender(&self) -> &CommandSender {
        &self.sender
    }

    pub(crate) fn settle(&self) {
        self.outstanding.store(false, Ordering::Release);
    }
}

/// Everything an [`Interface`] can be told, as a value.
#[derive(Debug, Clone)]
pub enum Notification {
    SolverReady(SolveTrigger),
    Progress(f64),
    Solved(Sudoku),
    Measured(Measurement),
    Aborted,
    Error(OrchestratorError),
}

/// An interface that forwards every callback to a channel.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sudoku_orchestrator::{ChannelInterface, Notification, Orchestrator};
/// use sudoku_solver::BuiltinLoader;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let (interface, mut rx) = ChannelInterface::new();
/// let mut orchestrator = Orchestrator::new(Arc::new(BuiltinLoader::new()), Arc::new(interface));
/// orchestrator.start()?;
///
/// while let Some(notification) = rx.recv().await {
///     if let Notification::SolverReady(solver) = notification {
///         solver.solve("0".repeat(81).parse()?, None)?;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelInterface {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelInterface {
    /// Create the interface and the receiver for its notifications.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            trace!("Notification receiver dropped");
        }
    }
}

#[async_trait]
impl Interface for ChannelInterface {
    async fn set_solver(&self, solver: SolveTrigger) {
        self.forward(Notification::SolverReady(solver));
    }

    async fn on_progress(&self, value: f64) {
        self.forward(Notification::Progress(value));
    }

    async fn on_solve(&self, solution: Sudoku) {
        self.forward(Notification::Solved(solution));
    }

    async fn on_measure(&self, measurement: Measurement) {
        self.forward(Notification::Measured(measurement));
    }

    async fn on_aborted(&self) {
        self.forward(Notification::Aborted);
    }

    async fn on_error(&self, error: OrchestratorError) {
        self.forward(Notification::Error(error));
    }
}
