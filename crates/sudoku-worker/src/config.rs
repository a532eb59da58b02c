//! Worker configuration.

use sudoku_solver::DEFAULT_PROGRESS_STEP;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Capacity of the command channel.
    pub command_capacity: usize,

    /// Capacity of the event channel. Progress events are dropped while it
    /// is full; terminal events wait for room.
    pub event_capacity: usize,

    /// Minimum progress increase between two `Progress` events.
    pub progress_step: f64,

    /// Name recorded in every measurement.
    pub measure_name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command_capacity: 16,
            event_capacity: 64,
            progress_step: DEFAULT_PROGRESS_STEP,
            measure_name: "perf_measure".to_string(),
        }
    }
}
