//! Solver bridge: turns a `Solve` command into a solver module call and the
//! call's outcome back into protocol events.

use std::sync::Arc;

use sudoku_core::{Clock, Measurement, Rules, SolveError, Sudoku};
use sudoku_proto::Event;
use sudoku_solver::{Reporter, SolverError, SolverModule};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::WorkerConfig;

/// What a finished solve produced, with the time it took.
#[derive(Debug)]
pub(crate) struct SolveOutcome {
    pub result: Result<Sudoku, SolverError>,
    pub measurement: Measurement,
}

/// A solve running on a blocking thread.
#[derive(Debug)]
pub(crate) struct ActiveSolve {
    pub handle: JoinHandle<SolveOutcome>,
    cancel: CancellationToken,
}

impl ActiveSolve {
    /// Ask the solver to stop. The outcome still arrives through `handle`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Owns the loaded module and starts solves against it.
#[derive(Debug, Clone)]
pub(crate) struct SolverBridge {
    module: Arc<dyn SolverModule>,
    events: mpsc::Sender<Event>,
    clock: Clock,
    progress_step: f64,
    measure_name: String,
}

impl SolverBridge {
    pub fn new(
        module: Arc<dyn SolverModule>,
        events: mpsc::Sender<Event>,
        clock: Clock,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            module,
            events,
            clock,
            progress_step: config.progress_step,
            measure_name: config.measure_name.clone(),
        }
    }

    /// Start solving `puzzle` on a blocking thread.
    ///
    /// Progress is forwarded as `Progress` events with `try_send`: the solver
    /// never waits on the channel, and values are dropped while it is full or
    /// once the solve is cancelled.
    pub fn start(&self, puzzle: Sudoku, rules: Option<Rules>) -> ActiveSolve {
        let cancel = CancellationToken::new();
        let gate = cancel.clone();
        let events = self.events.clone();
        let mut reporter = Reporter::new(self.progress_step, cancel.clone(), move |value| {
            if gate.is_cancelled() {
                return;
            }
            match events.try_send(Event::Progress { value }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => trace!(value, "Event channel full, progress dropped"),
                Err(TrySendError::Closed(_)) => {}
            }
        });

        let module = Arc::clone(&self.module);
        let clock = self.clock;
        let name = self.measure_name.clone();
        info!(
            module = module.name(),
            empty_cells = puzzle.empty_count(),
            cages = rules.as_ref().map_or(0, |r| r.cages.len()),
            "Starting solve"
        );

        let handle = tokio::task::spawn_blocking(move || {
            let mark = clock.mark();
            let result = module.solve(&puzzle, rules.as_ref(), &mut reporter);
            let measurement = mark.finish(name);
            SolveOutcome {
                result,
                measurement,
            }
        });

        ActiveSolve { handle, cancel }
    }
}

/// Translate a finished solve into its terminal event.
///
/// Solver errors and panics never cross the boundary as such; they become
/// `SolveFailed`.
pub(crate) fn terminal_event(joined: Result<SolveOutcome, JoinError>) -> Event {
    match joined {
        Ok(SolveOutcome {
            result: Ok(solution),
            measurement,
        }) => {
            info!(duration_ms = measurement.duration, "Solve completed");
            Event::Solved {
                solution,
                measurement,
            }
        }
        Ok(SolveOutcome {
            result: Err(SolverError::Cancelled),
            ..
        }) => {
            info!("Solve aborted");
            Event::Aborted
        }
        Ok(SolveOutcome {
            result: Err(SolverError::Solve(error)),
            ..
        }) => {
            debug!(error = %error, "Solve failed");
            Event::SolveFailed { error }
        }
        Ok(SolveOutcome {
            result: Err(SolverError::LoadFailed(message)),
            ..
        }) => {
            warn!(error = %message, "Solver reported a load failure during solve");
            Event::SolveFailed {
                error: SolveError::Internal(message),
            }
        }
        Err(e) => {
            let message = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            warn!(error = %message, "Solver task failed");
            Event::SolveFailed {
                error: SolveError::Internal(message),
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("solver panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("solver panicked: {}", s)
    } else {
        "solver panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sudoku_solver::BacktrackSolver;

    fn bridge(capacity: usize) -> (SolverBridge, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        let config = WorkerConfig {
            progress_step: 0.0,
            ..Default::default()
        };
        let bridge = SolverBridge::new(Arc::new(BacktrackSolver::new()), tx, Clock::new(), &config);
        (bridge, rx)
    }

    #[tokio::test]
    async fn test_solved_event_with_measurement() {
        let (bridge, mut rx) = bridge(1024);
        let active = bridge.start(Sudoku::empty(), None);
        let event = terminal_event(active.handle.await);

        match event {
            Event::Solved {
                solution,
                measurement,
            } => {
                assert!(solution.is_solved());
                assert_eq!(measurement.name, "perf_measure");
                assert!(measurement.duration >= 0.0);
            }
            other => panic!("Expected Solved, got {:?}", other),
        }

        let mut last = 0.0;
        while let Ok(Event::Progress { value }) = rx.try_recv() {
            assert!(value >= last);
            last = value;
        }
    }

    #[tokio::test]
    async fn test_full_channel_drops_progress() {
        let (bridge, mut rx) = bridge(1);
        let active = bridge.start(Sudoku::empty(), None);
        let event = terminal_event(active.handle.await);
        assert!(matches!(event, Event::Solved { .. }));

        let mut buffered = 0;
        while rx.try_recv().is_ok() {
            buffered += 1;
        }
        assert!(buffered <= 1);
    }

    #[tokio::test]
    async fn test_invalid_puzzle_maps_to_solve_failed() {
        let (bridge, _rx) = bridge(8);
        let mut puzzle = Sudoku::empty();
        puzzle.set(0, 1).unwrap();
        puzzle.set(1, 1).unwrap();
        let event = terminal_event(bridge.start(puzzle, None).handle.await);
        assert!(matches!(
            event,
            Event::SolveFailed {
                error: SolveError::InvalidPuzzle(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let handle = tokio::task::spawn_blocking(|| -> SolveOutcome { panic!("boom") });
        let event = terminal_event(handle.await);
        match event {
            Event::SolveFailed {
                error: SolveError::Internal(message),
            } => assert_eq!(message, "solver panicked: boom"),
            other => panic!("Expected SolveFailed, got {:?}", other),
        }
    }
}
