//! Progress reporting from inside a running solve.

use std::fmt;

use tokio_util::sync::CancellationToken;

/// Minimum increase between two forwarded progress values.
pub const DEFAULT_PROGRESS_STEP: f64 = 0.01 / 8.0;

type Sink = Box<dyn FnMut(f64) + Send>;

/// Handed to [`crate::SolverModule::solve`] for progress and cancellation.
///
/// Values are coalesced: a value is forwarded only when it exceeds the last
/// forwarded one by more than `step`. Forwarded values therefore never
/// decrease, whatever the solver reports.
pub struct Reporter {
    sink: Option<Sink>,
    step: f64,
    reported: f64,
    cancel: CancellationToken,
}

impl Reporter {
    /// Create a reporter forwarding to `sink`.
    pub fn new(step: f64, cancel: CancellationToken, sink: impl FnMut(f64) + Send + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
            step,
            reported: 0.0,
            cancel,
        }
    }

    /// A reporter that drops all progress and is never cancelled.
    pub fn silent() -> Self {
        Self {
            sink: None,
            step: DEFAULT_PROGRESS_STEP,
            reported: 0.0,
            cancel: CancellationToken::new(),
        }
    }

    /// Report progress. Non-finite values are ignored.
    pub fn report(&mut self, value: f64) {
        if !value.is_finite() || value <= self.reported + self.step {
            return;
        }
        self.reported = value;
        if let Some(sink) = self.sink.as_mut() {
            sink(value);
        }
    }

    /// Last forwarded value.
    pub fn reported(&self) -> f64 {
        self.reported
    }

    /// True once the solve has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("step", &self.step)
            .field("reported", &self.reported)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
