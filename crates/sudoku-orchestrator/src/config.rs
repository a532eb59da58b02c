//! Orchestrator configuration.

use std::time::Duration;

use sudoku_worker::WorkerConfig;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Configuration passed to every worker the orchestrator spawns.
    pub worker: WorkerConfig,

    /// How long to wait for `Ready` before reporting a load failure.
    /// `None` waits forever.
    pub ready_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            ready_timeout: Some(Duration::from_secs(30)),
        }
    }
}
