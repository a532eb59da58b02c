//! Worker lifecycle and event dispatch.

use std::future::Future;
use std::sync::Arc;

use sudoku_core::{Clock, Rules, Sudoku, WorkerId, WorkerState};
use sudoku_proto::{Command, Event};
use sudoku_solver::SolverLoader;
use sudoku_worker::{CommandSender, WorkerError, WorkerHandle, WorkerRuntime};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::interface::{Interface, SolveTrigger};

/// Whether the current worker has become usable.
#[derive(Debug, Clone)]
enum Readiness {
    Pending,
    Ready(SolveTrigger),
    Failed(OrchestratorError),
}

impl Readiness {
    fn resolve(&self) -> Result<SolveTrigger, OrchestratorError> {
        match self {
            Self::Ready(trigger) => Ok(trigger.clone()),
            Self::Failed(e) => Err(e.clone()),
            Self::Pending => Err(OrchestratorError::NotReady),
        }
    }
}

/// One spawned worker and the task dispatching its events.
struct Session {
    worker: WorkerHandle,
    dispatch: JoinHandle<()>,
    readiness: watch::Receiver<Readiness>,
}

impl Session {
    /// Stop the worker without waiting for it.
    fn teardown(self) {
        self.dispatch.abort();
        // the dispatcher no longer settles outstanding solves
        if let Readiness::Ready(trigger) = &*self.readiness.borrow() {
            trigger.settle();
        }
        terminate_worker(self.worker.sender());
        info!(worker_id = %self.worker.id(), "Worker torn down");
    }
}

/// Queue `Terminate` without waiting, falling back to a spawned send when
/// the command queue is full.
fn terminate_worker(sender: CommandSender) {
    match sender.try_send(Command::Terminate) {
        Ok(()) => {}
        Err(WorkerError::QueueFull) => {
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                warn!(worker_id = %sender.worker_id(), "No runtime to deliver terminate");
                return;
            };
            runtime.spawn(async move {
                if sender.send(Command::Terminate).await.is_err() {
                    debug!(worker_id = %sender.worker_id(), "Worker already stopped");
                }
            });
        }
        Err(_) => debug!(worker_id = %sender.worker_id(), "Worker already stopped"),
    }
}

/// Owns one worker at a time and connects it to an [`Interface`].
pub struct Orchestrator {
    loader: Arc<dyn SolverLoader>,
    interface: Arc<dyn Interface>,
    config: OrchestratorConfig,
    clock: Clock,
    session: Option<Session>,
}

impl Orchestrator {
    /// Create an orchestrator. Nothing is spawned until [`start`](Self::start).
    pub fn new(loader: Arc<dyn SolverLoader>, interface: Arc<dyn Interface>) -> Self {
        Self {
            loader,
            interface,
            config: OrchestratorConfig::default(),
            clock: Clock::new(),
            session: None,
        }
    }

    /// Set the orchestrator configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock shared with every worker. Measurements are relative to its origin.
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Spawn a worker and ask it to load the solver.
    ///
    /// Returns without waiting for the load. Readiness is reported through
    /// [`Interface::set_solver`] and [`ready`](Self::ready). Calling `start`
    /// again tears the current worker down and spawns a fresh one.
    pub fn start(&mut self) -> Result<(), OrchestratorError> {
        if let Some(previous) = self.session.take() {
            previous.teardown();
        }

        let (worker, events) = WorkerRuntime::new(Arc::clone(&self.loader))
            .with_config(self.config.worker.clone())
            .with_clock(self.clock)
            .spawn();
        worker.try_send(Command::Init)?;

        let (readiness_tx, readiness_rx) = watch::channel(Readiness::Pending);
        let dispatcher = Dispatcher {
            events,
            interface: Arc::clone(&self.interface),
            trigger: SolveTrigger::new(worker.sender()),
            readiness: readiness_tx,
        };
        let deadline = self.config.ready_timeout.map(|t| Instant::now() + t);
        let span = info_span!("dispatch", worker_id = %worker.id());
        let dispatch = tokio::spawn(dispatcher.run(deadline).instrument(span));

        info!(worker_id = %worker.id(), "Orchestrator started");
        self.session = Some(Session {
            worker,
            dispatch,
            readiness: readiness_rx,
        });
        Ok(())
    }

    /// Wait until the current worker is ready and return its trigger.
    ///
    /// The returned future does not borrow the orchestrator: it resolves for
    /// the worker that was current when `ready` was called, even if that
    /// worker is shut down or replaced in the meantime.
    pub fn ready(
        &self,
    ) -> impl Future<Output = Result<SolveTrigger, OrchestratorError>> + Send + 'static {
        let readiness = self.session.as_ref().map(|s| s.readiness.clone());
        async move {
            let mut readiness = readiness.ok_or(OrchestratorError::NotReady)?;
            let result = readiness
                .wait_for(|r| !matches!(r, Readiness::Pending))
                .await
                .map(|state| state.resolve())
                .map_err(|_| OrchestratorError::Channel("dispatch task stopped".to_string()))?;
            result
        }
    }

    /// The trigger of the current worker, if it is ready.
    pub fn trigger(&self) -> Result<SolveTrigger, OrchestratorError> {
        let session = self.session.as_ref().ok_or(OrchestratorError::NotReady)?;
        let readiness = session.readiness.borrow();
        readiness.resolve()
    }

    /// Send a `Solve` command. Fails with `NotReady` before the worker is ready.
    pub fn solve(&self, puzzle: Sudoku, rules: Option<Rules>) -> Result<(), OrchestratorError> {
        self.trigger()?.solve(puzzle, rules)
    }

    /// Ask the worker to abort the current solve.
    pub fn cancel(&self) -> Result<(), OrchestratorError> {
        self.trigger()?.cancel()
    }

    /// Id of the current worker.
    pub fn worker_id(&self) -> Option<&WorkerId> {
        self.session.as_ref().map(|s| s.worker.id())
    }

    /// Lifecycle state of the current worker.
    pub fn worker_state(&self) -> Option<watch::Receiver<WorkerState>> {
        self.session.as_ref().map(|s| s.worker.watch_state())
    }

    /// Terminate the worker and wait for it and the dispatch task to stop.
    pub async fn shutdown(&mut self) -> Result<(), OrchestratorError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let worker_id = session.worker.id().clone();
        session
            .worker
            .terminate()
            .await
            .map_err(OrchestratorError::from)?;
        if let Err(e) = session.dispatch.await {
            if !e.is_cancelled() {
                warn!(worker_id = %worker_id, error = %e, "Dispatch task failed");
            }
        }
        info!(worker_id = %worker_id, "Orchestrator shut down");
        Ok(())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.teardown();
        }
    }
}

/// Forwards one worker's events to the interface.
struct Dispatcher {
    events: mpsc::Receiver<Event>,
    interface: Arc<dyn Interface>,
    trigger: SolveTrigger,
    readiness: watch::Sender<Readiness>,
}

impl Dispatcher {
    async fn run(mut self, deadline: Option<Instant>) {
        if let Err(e) = self.await_ready(deadline).await {
            warn!(error = %e, "Worker did not become ready");
            terminate_worker(self.trigger.sender().clone());
            self.readiness.send_replace(Readiness::Failed(e.clone()));
            self.interface.on_error(e).await;
            return;
        }

        self.readiness
            .send_replace(Readiness::Ready(self.trigger.clone()));
        self.interface.set_solver(self.trigger.clone()).await;

        while let Some(event) = self.events.recv().await {
            self.dispatch(event).await;
        }

        debug!("Worker event channel closed");
        if self.trigger.is_solving() {
            self.trigger.settle();
            self.interface
                .on_error(OrchestratorError::Channel(
                    "worker stopped with a solve outstanding".to_string(),
                ))
                .await;
        }
    }

    async fn await_ready(&mut self, deadline: Option<Instant>) -> Result<(), OrchestratorError> {
        loop {
            let next = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, self.events.recv())
                    .await
                    .map_err(|_| {
                        OrchestratorError::Load("worker did not become ready in time".to_string())
                    })?,
                None => self.events.recv().await,
            };

            match next {
                Some(Event::Ready) => {
                    info!("Solver ready");
                    return Ok(());
                }
                Some(Event::LoadFailed { message }) => return Err(OrchestratorError::Load(message)),
                Some(other) => debug!(event = other.tag(), "Ignoring event before ready"),
                None => {
                    return Err(OrchestratorError::Channel(
                        "worker stopped before ready".to_string(),
                    ))
                }
            }
        }
    }

    async fn dispatch(&self, event: Event) {
        if event.is_terminal_for_solve() {
            self.trigger.settle();
        }
        match event {
            Event::Progress { value } => self.interface.on_progress(value).await,
            Event::Solved {
                solution,
                measurement,
            } => {
                info!(measurement = %measurement, "Puzzle solved");
                self.interface.on_solve(solution).await;
                self.interface.on_measure(measurement).await;
            }
            Event::SolveFailed { error } => {
                self.interface.on_error(OrchestratorError::Solve(error)).await;
            }
            Event::Aborted => self.interface.on_aborted().await,
            Event::Rejected { command, reason } => {
                if command == "solve" {
                    self.trigger.settle();
                }
                self.interface
                    .on_error(OrchestratorError::ProtocolViolation { command, reason })
                    .await;
            }
            Event::LoadFailed { message } => {
                warn!(error = %message, "Load failure after ready");
                self.interface.on_error(OrchestratorError::Load(message)).await;
            }
            Event::Ready => debug!("Duplicate ready"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use sudoku_core::{Measurement, SolveError};
    use sudoku_solver::{
        BuiltinLoader, Reporter, SolverError, SolverModule, UnavailableLoader,
    };
    use tokio::sync::Notify;

    use crate::interface::{ChannelInterface, Notification};

    #[derive(Debug)]
    struct SpinModule;

    impl SolverModule for SpinModule {
        fn name(&self) -> &str {
            "spin"
        }

        fn solve(
            &self,
            _puzzle: &Sudoku,
            _rules: Option<&Rules>,
            reporter: &mut Reporter,
        ) -> Result<Sudoku, SolverError> {
            let started = std::time::Instant::now();
            while started.elapsed() < Duration::from_secs(10) {
                if reporter.is_cancelled() {
                    return Err(SolverError::Cancelled);
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(SolveError::Internal("spin module never cancelled".to_string()).into())
        }
    }

    /// Loads `module` once `gate` is notified.
    struct GatedLoader {
        module: Arc<dyn SolverModule>,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl SolverLoader for GatedLoader {
        async fn load(&self) -> Result<Arc<dyn SolverModule>, SolverError> {
            self.gate.notified().await;
            Ok(Arc::clone(&self.module))
        }
    }

    struct Immediate(Arc<dyn SolverModule>);

    #[async_trait]
    impl SolverLoader for Immediate {
        async fn load(&self) -> Result<Arc<dyn SolverModule>, SolverError> {
            Ok(Arc::clone(&self.0))
        }
    }

    fn orchestrator(
        loader: Arc<dyn SolverLoader>,
    ) -> (Orchestrator, mpsc::UnboundedReceiver<Notification>) {
        let (interface, rx) = ChannelInterface::new();
        (Orchestrator::new(loader, Arc::new(interface)), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for notification")
            .expect("notification channel closed")
    }

    async fn next_non_progress(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
        loop {
            match next(rx).await {
                Notification::Progress(_) => continue,
                other => return other,
            }
        }
    }

    #[tokio::test]
    async fn test_start_returns_before_ready() {
        let gate = Arc::new(Notify::new());
        let loader = GatedLoader {
            module: Arc::new(SpinModule),
            gate: Arc::clone(&gate),
        };
        let (mut orch, mut rx) = orchestrator(Arc::new(loader));

        orch.start().unwrap();
        assert!(matches!(orch.trigger(), Err(OrchestratorError::NotReady)));

        gate.notify_one();
        let trigger = orch.ready().await.unwrap();
        assert!(matches!(next(&mut rx).await, Notification::SolverReady(_)));
        assert!(!trigger.is_solving());
    }

    #[tokio::test]
    async fn test_solve_dispatches_solution_then_measurement() {
        let (mut orch, mut rx) = orchestrator(Arc::new(BuiltinLoader::new()));
        orch.start().unwrap();

        let solver = match next(&mut rx).await {
            Notification::SolverReady(solver) => solver,
            other => panic!("Expected SolverReady, got {:?}", other),
        };

        let sent_at = orch.clock().now_ms();
        solver.solve(Sudoku::empty(), None).unwrap();

        let solution = match next_non_progress(&mut rx).await {
            Notification::Solved(solution) => solution,
            other => panic!("Expected Solved, got {:?}", other),
        };
        assert!(solution.is_solved());

        let measurement: Measurement = match next(&mut rx).await {
            Notification::Measured(m) => m,
            other => panic!("Expected Measured, got {:?}", other),
        };
        assert!(measurement.duration >= 0.0);
        assert!(measurement.end_time() >= sent_at);
        assert!(!solver.is_solving());
    }

    #[tokio::test]
    async fn test_solve_before_ready_is_usage_error() {
        let gate = Arc::new(Notify::new());
        let loader = GatedLoader {
            module: Arc::new(SpinModule),
            gate,
        };
        let (mut orch, _rx) = orchestrator(Arc::new(loader));

        assert_eq!(
            orch.solve(Sudoku::empty(), None),
            Err(OrchestratorError::NotReady)
        );

        orch.start().unwrap();
        assert_eq!(
            orch.solve(Sudoku::empty(), None),
            Err(OrchestratorError::NotReady)
        );

        let mut state = orch.worker_state().unwrap();
        state
            .wait_for(|s| *s == WorkerState::Loading)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_second_solve_is_in_flight() {
        let (mut orch, _rx) = orchestrator(Arc::new(BuiltinLoader::new()));
        orch.start().unwrap();
        let solver = orch.ready().await.unwrap();

        solver.solve(Sudoku::empty(), None).unwrap();
        assert_eq!(
            solver.clone().solve(Sudoku::empty(), None),
            Err(OrchestratorError::SolveInFlight)
        );
    }

    #[tokio::test]
    async fn test_invalid_puzzle_reports_solve_error() {
        let (mut orch, mut rx) = orchestrator(Arc::new(BuiltinLoader::new()));
        orch.start().unwrap();
        let solver = orch.ready().await.unwrap();
        assert!(matches!(next(&mut rx).await, Notification::SolverReady(_)));

        let mut puzzle = Sudoku::empty();
        puzzle.set(0, 4).unwrap();
        puzzle.set(8, 4).unwrap();
        solver.solve(puzzle, None).unwrap();

        match next_non_progress(&mut rx).await {
            Notification::Error(OrchestratorError::Solve(SolveError::InvalidPuzzle(_))) => {}
            other => panic!("Expected solve error, got {:?}", other),
        }

        // worker is still usable
        solver.solve(Sudoku::empty(), None).unwrap();
        assert!(matches!(
            next_non_progress(&mut rx).await,
            Notification::Solved(_)
        ));
    }

    #[tokio::test]
    async fn test_load_failure_surfaces() {
        let (mut orch, mut rx) = orchestrator(Arc::new(UnavailableLoader::new("no engine")));
        orch.start().unwrap();

        assert_eq!(
            orch.ready().await.unwrap_err(),
            OrchestratorError::Load("no engine".to_string())
        );
        match next(&mut rx).await {
            Notification::Error(e) => assert!(e.is_fatal()),
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ready_timeout() {
        let loader = GatedLoader {
            module: Arc::new(SpinModule),
            gate: Arc::new(Notify::new()),
        };
        let (interface, _rx) = ChannelInterface::new();
        let config = OrchestratorConfig {
            ready_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let mut orch =
            Orchestrator::new(Arc::new(loader), Arc::new(interface)).with_config(config);
        orch.start().unwrap();

        assert!(matches!(
            orch.ready().await,
            Err(OrchestratorError::Load(_))
        ));
    }

    #[tokio::test]
    async fn test_ready_timeout_terminates_worker() {
        let gate = Arc::new(Notify::new());
        let loader = GatedLoader {
            module: Arc::new(SpinModule),
            gate: Arc::clone(&gate),
        };
        let (interface, _rx) = ChannelInterface::new();
        let config = OrchestratorConfig {
            ready_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let mut orch =
            Orchestrator::new(Arc::new(loader), Arc::new(interface)).with_config(config);
        orch.start().unwrap();
        let mut state = orch.worker_state().unwrap();

        let err = orch.ready().await.unwrap_err();
        assert!(err.is_fatal());

        // a load finishing late must not revive the worker
        gate.notify_one();
        tokio::time::timeout(
            Duration::from_secs(10),
            state.wait_for(|s| *s == WorkerState::Terminated),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(matches!(orch.trigger(), Err(OrchestratorError::Load(_))));
    }

    #[tokio::test]
    async fn test_shutdown_before_ready_reports_channel() {
        let loader = GatedLoader {
            module: Arc::new(SpinModule),
            gate: Arc::new(Notify::new()),
        };
        let (mut orch, mut rx) = orchestrator(Arc::new(loader));
        orch.start().unwrap();

        let mut state = orch.worker_state().unwrap();
        state
            .wait_for(|s| *s == WorkerState::Loading)
            .await
            .unwrap();

        let ready = orch.ready();
        orch.shutdown().await.unwrap();

        assert!(matches!(ready.await, Err(OrchestratorError::Channel(_))));
        match next(&mut rx).await {
            Notification::Error(OrchestratorError::Channel(_)) => {}
            other => panic!("Expected channel error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_restart_settles_outstanding_solve() {
        let (mut orch, _rx) = orchestrator(Arc::new(BuiltinLoader::new()));
        orch.start().unwrap();
        let old_solver = orch.ready().await.unwrap();
        let mut old_state = orch.worker_state().unwrap();

        old_solver.solve(Sudoku::empty(), None).unwrap();
        orch.start().unwrap();
        assert!(!old_solver.is_solving());

        tokio::time::timeout(
            Duration::from_secs(10),
            old_state.wait_for(|s| *s == WorkerState::Terminated),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(matches!(
            old_solver.solve(Sudoku::empty(), None),
            Err(OrchestratorError::Channel(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_dispatches_aborted() {
        let (mut orch, mut rx) = orchestrator(Arc::new(Immediate(Arc::new(SpinModule))));
        orch.start().unwrap();
        let solver = orch.ready().await.unwrap();
        assert!(matches!(next(&mut rx).await, Notification::SolverReady(_)));

        solver.solve(Sudoku::empty(), None).unwrap();
        let mut state = orch.worker_state().unwrap();
        state
            .wait_for(|s| *s == WorkerState::Solving)
            .await
            .unwrap();

        orch.cancel().unwrap();
        assert!(matches!(
            next_non_progress(&mut rx).await,
            Notification::Aborted
        ));
        assert!(!solver.is_solving());
    }

    #[tokio::test]
    async fn test_restart_replaces_worker() {
        let (mut orch, _rx) = orchestrator(Arc::new(BuiltinLoader::new()));
        orch.start().unwrap();
        let old_trigger = orch.ready().await.unwrap();
        let old_id = orch.worker_id().cloned().unwrap();
        let mut old_state = orch.worker_state().unwrap();

        orch.start().unwrap();
        assert_ne!(orch.worker_id(), Some(&old_id));

        tokio::time::timeout(
            Duration::from_secs(10),
            old_state.wait_for(|s| *s == WorkerState::Terminated),
        )
        .await
        .unwrap()
        .unwrap();

        let trigger = orch.ready().await.unwrap();
        assert_ne!(trigger.worker_id(), &old_id);
        assert!(matches!(
            old_trigger.solve(Sudoku::empty(), None),
            Err(OrchestratorError::Channel(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let (mut orch, _rx) = orchestrator(Arc::new(BuiltinLoader::new()));
        orch.start().unwrap();
        let solver = orch.ready().await.unwrap();
        let state = orch.worker_state().unwrap();

        orch.shutdown().await.unwrap();
        assert_eq!(*state.borrow(), WorkerState::Terminated);
        assert!(orch.worker_id().is_none());
        assert!(matches!(
            solver.solve(Sudoku::empty(), None),
            Err(OrchestratorError::Channel(_))
        ));

        // idempotent
        orch.shutdown().await.unwrap();
    }
}
