//! Ready-to-use implementations of the `SolverLoader` trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::backtrack::BacktrackSolver;
use crate::error::SolverError;
use crate::module::{SolverLoader, SolverModule};

/// Loads the builtin [`BacktrackSolver`].
///
/// An optional delay stands in for the fetch/compile step of a real module
/// artifact, which is useful when exercising the worker's `Loading` state.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use sudoku_solver::{BuiltinLoader, SolverLoader};
///
/// async fn load() -> Result<(), Box<dyn std::error::Error>> {
///     let loader = BuiltinLoader::new().with_load_delay(Duration::from_millis(50));
///     let module = loader.load().await?;
///     println!("Loaded {}", module.name());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct BuiltinLoader {
    load_delay: Option<Duration>,
}

impl BuiltinLoader {
    /// Create a loader that resolves immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a simulated load delay.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }
}

#[async_trait]
impl SolverLoader for BuiltinLoader {
    async fn load(&self) -> Result<Arc<dyn SolverModule>, SolverError> {
        if let Some(delay) = self.load_delay {
            debug!(delay_ms = delay.as_millis() as u64, "Simulating module load");
            tokio::time::sleep(delay).await;
        }
        let module = BacktrackSolver::new();
        info!(module = module.name(), "Solver module loaded");
        Ok(Arc::new(module))
    }
}

/// A loader that always fails.
///
/// Useful for testing or for running the interface without a solver engine.
#[derive(Debug, Clone)]
pub struct UnavailableLoader {
    reason: String,
}

impl UnavailableLoader {
    /// Create a loader failing with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SolverLoader for UnavailableLoader {
    async fn load(&self) -> Result<Arc<dyn SolverModule>, SolverError> {
        warn!(reason = %self.reason, "Solver module unavailable");
        Err(SolverError::LoadFailed(self.reason.clone()))
    }
}
