//! The worker task: command loop, lifecycle state machine and handle.

use std::sync::Arc;

use sudoku_core::{Clock, WorkerId, WorkerState};
use sudoku_proto::{Command, Event, RejectReason};
use sudoku_solver::{SolverError, SolverLoader, SolverModule};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::bridge::{terminal_event, ActiveSolve, SolveOutcome, SolverBridge};
use crate::config::WorkerConfig;
use crate::error::WorkerError;

type LoadResult = Result<Arc<dyn SolverModule>, SolverError>;

/// Builds and spawns worker tasks.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sudoku_proto::{Command, Event};
/// use sudoku_solver::BuiltinLoader;
/// use sudoku_worker::WorkerRuntime;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let (worker, mut events) = WorkerRuntime::new(Arc::new(BuiltinLoader::new())).spawn();
/// worker.send(Command::Init).await?;
/// assert_eq!(events.recv().await, Some(Event::Ready));
/// # Ok(())
/// # }
/// ```
pub struct WorkerRuntime {
    loader: Arc<dyn SolverLoader>,
    config: WorkerConfig,
    clock: Clock,
}

impl WorkerRuntime {
    /// Create a runtime that loads its module through `loader`.
    pub fn new(loader: Arc<dyn SolverLoader>) -> Self {
        Self {
            loader,
            config: WorkerConfig::default(),
            clock: Clock::new(),
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a clock with the caller so measurements can be compared with
    /// the caller's own readings.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Spawn the worker task on the current tokio runtime.
    ///
    /// The worker starts `Unloaded`; nothing is loaded until it receives
    /// `Init`. It runs until it receives `Terminate` or every command sender
    /// is dropped.
    pub fn spawn(self) -> (WorkerHandle, mpsc::Receiver<Event>) {
        let id = WorkerId::generate();
        let (command_tx, command_rx) = mpsc::channel(self.config.command_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(self.config.event_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(WorkerState::Unloaded);

        let worker = Worker {
            loader: self.loader,
            config: self.config,
            clock: self.clock,
            commands: command_rx,
            events: event_tx,
            state: state_tx,
            loading: None,
            bridge: None,
            active: None,
        };

        let span = info_span!("worker", worker_id = %id);
        let task = tokio::spawn(worker.run().instrument(span));
        info!(worker_id = %id, "Worker spawned");

        let handle = WorkerHandle {
            id,
            commands: command_tx,
            state: state_rx,
            task,
        };
        (handle, event_rx)
    }
}

/// Owner-side handle to a running worker.
///
/// Dropping the handle (and every [`CommandSender`] cloned from it) closes
/// the command channel, which stops the worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<WorkerState>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// A receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    /// Send a command, waiting for room in the queue.
    pub async fn send(&self, command: Command) -> Result<(), WorkerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Send a command without waiting.
    pub fn try_send(&self, command: Command) -> Result<(), WorkerError> {
        try_send(&self.commands, command)
    }

    /// A cloneable sender for commands to this worker.
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            worker_id: self.id.clone(),
            inner: self.commands.clone(),
        }
    }

    /// Wait until the worker's state satisfies `predicate` and return it.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(WorkerState) -> bool,
    ) -> Result<WorkerState, WorkerError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|s| predicate(*s))
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        Ok(*state)
    }

    /// Returns true once the worker task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Send `Terminate` and wait for the worker task to exit.
    pub async fn terminate(self) -> Result<(), WorkerError> {
        if self.commands.send(Command::Terminate).await.is_err() {
            debug!(worker_id = %self.id, "Worker already stopped");
        }
        drop(self.commands);
        self.task
            .await
            .map_err(|e| WorkerError::TaskFailed(e.to_string()))
    }
}

/// Cloneable command sender for one worker.
#[derive(Debug, Clone)]
pub struct CommandSender {
    worker_id: WorkerId,
    inner: mpsc::Sender<Command>,
}

impl CommandSender {
    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Send a command, waiting for room in the queue.
    pub async fn send(&self, command: Command) -> Result<(), WorkerError> {
        self.inner
            .send(command)
            .await
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Send a command without waiting.
    pub fn try_send(&self, command: Command) -> Result<(), WorkerError> {
        try_send(&self.inner, command)
    }

    /// Returns true once the worker no longer reads commands.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

fn try_send(tx: &mpsc::Sender<Command>, command: Command) -> Result<(), WorkerError> {
    tx.try_send(command).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => WorkerError::QueueFull,
        mpsc::error::TrySendError::Closed(_) => WorkerError::ChannelClosed,
    })
}

/// What woke the worker loop.
enum Step {
    Command(Option<Command>),
    Loaded(Result<LoadResult, JoinError>),
    Finished(Result<SolveOutcome, JoinError>),
}

struct Worker {
    loader: Arc<dyn SolverLoader>,
    config: WorkerConfig,
    clock: Clock,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<Event>,
    state: watch::Sender<WorkerState>,
    loading: Option<JoinHandle<LoadResult>>,
    bridge: Option<SolverBridge>,
    active: Option<ActiveSolve>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                command = self.commands.recv() => Step::Command(command),
                loaded = join_some(self.loading.as_mut()) => Step::Loaded(loaded),
                finished = join_some(self.active.as_mut().map(|a| &mut a.handle)) => {
                    Step::Finished(finished)
                }
            };

            match step {
                Step::Command(Some(command)) => {
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                Step::Command(None) => {
                    debug!("Command channel closed");
                    break;
                }
                Step::Loaded(result) => {
                    self.loading = None;
                    self.on_loaded(result).await;
                }
                Step::Finished(result) => {
                    self.active = None;
                    self.set_state(WorkerState::Ready);
                    self.emit(terminal_event(result)).await;
                }
            }
        }

        self.shutdown();
    }

    /// Returns false when the worker should stop.
    async fn handle_command(&mut self, command: Command) -> bool {
        let state = self.current_state();
        debug!(command = command.tag(), state = %state, "Command received");

        match command {
            Command::Init => match state {
                WorkerState::Unloaded => self.start_loading(),
                WorkerState::Ready => self.emit(Event::Ready).await,
                WorkerState::Failed => self.reject("init", RejectReason::LoadFailed).await,
                _ => debug!(state = %state, "Init ignored, module already requested"),
            },
            Command::Solve { puzzle, rules } => match (state, &self.bridge) {
                (state, Some(bridge)) if state.can_accept_solve() => {
                    self.active = Some(bridge.start(puzzle, rules));
                    self.set_state(WorkerState::Solving);
                }
                (WorkerState::Solving, _) => self.reject("solve", RejectReason::Busy).await,
                (WorkerState::Failed, _) => self.reject("solve", RejectReason::LoadFailed).await,
                _ => self.reject("solve", RejectReason::NotReady).await,
            },
            Command::Cancel => match &self.active {
                Some(active) if !active.is_cancelled() => {
                    info!("Cancelling solve");
                    active.cancel();
                }
                _ => debug!(state = %state, "Cancel ignored, nothing to cancel"),
            },
            Command::Terminate => {
                info!("Terminate requested");
                return false;
            }
        }
        true
    }

    fn start_loading(&mut self) {
        self.set_state(WorkerState::Loading);
        let loader = Arc::clone(&self.loader);
        self.loading = Some(tokio::spawn(
            async move { loader.load().await }.in_current_span(),
        ));
        info!("Loading solver module");
    }

    async fn on_loaded(&mut self, result: Result<LoadResult, JoinError>) {
        match result {
            Ok(Ok(module)) => {
                info!(module = module.name(), "Solver module ready");
                self.bridge = Some(SolverBridge::new(
                    module,
                    self.events.clone(),
                    self.clock,
                    &self.config,
                ));
                self.set_state(WorkerState::Ready);
                self.emit(Event::Ready).await;
            }
            Ok(Err(e)) => {
                let message = match e {
                    SolverError::LoadFailed(message) => message,
                    other => other.to_string(),
                };
                warn!(error = %message, "Solver module failed to load");
                self.set_state(WorkerState::Failed);
                self.emit(Event::LoadFailed { message }).await;
            }
            Err(e) => {
                warn!(error = %e, "Loader task failed");
                self.set_state(WorkerState::Failed);
                self.emit(Event::LoadFailed {
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    async fn reject(&self, command: &str, reason: RejectReason) {
        debug!(command, reason = %reason, "Command rejected");
        self.emit(Event::Rejected {
            command: command.to_string(),
            reason,
        })
        .await;
    }

    async fn emit(&self, event: Event) {
        let tag = event.tag();
        if self.events.send(event).await.is_err() {
            debug!(event = tag, "Event receiver dropped");
        }
    }

    fn current_state(&self) -> WorkerState {
        *self.state.borrow()
    }

    fn set_state(&self, to: WorkerState) {
        let from = self.current_state();
        match from.transition(to) {
            Ok(next) => {
                self.state.send_replace(next);
                debug!(from = %from, to = %next, "Worker state changed");
            }
            Err(e) => warn!(error = %e, "Ignoring state change"),
        }
    }

    fn shutdown(&mut self) {
        self.commands.close();
        if let Some(active) = self.active.take() {
            active.cancel();
        }
        if let Some(loading) = self.loading.take() {
            loading.abort();
        }
        self.set_state(WorkerState::Terminated);
        info!("Worker stopped");
    }
}

async fn join_some<T>(handle: Option<&mut JoinHandle<T>>) -> Result<T, JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
