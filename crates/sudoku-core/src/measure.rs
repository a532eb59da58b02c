//! Timing measurements bracketing one solve.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Wall-clock cost of exactly one solve invocation.
///
/// Times are fractional milliseconds relative to the [`Clock`] origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Name of the measure.
    pub name: String,
    /// Milliseconds from the clock origin to the start of the solve.
    pub start_time: f64,
    /// Elapsed milliseconds. Never negative.
    pub duration: f64,
}

impl Measurement {
    /// Milliseconds from the clock origin to the end of the solve.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} ms", self.duration)
    }
}

/// Monotonic time origin.
///
/// The orchestrator creates one and hands a copy to each worker it spawns,
/// so timestamps from both sides are comparable.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the origin.
    pub fn now_ms(&self) -> f64 {
        millis(self.origin.elapsed())
    }

    /// Start timing.
    pub fn mark(&self) -> Mark {
        Mark {
            origin: self.origin,
            start: Instant::now(),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// A started timing, finished into a [`Measurement`].
#[derive(Debug, Clone, Copy)]
pub struct Mark {
    origin: Instant,
    start: Instant,
}

impl Mark {
    /// Stop timing and produce the measurement.
    pub fn finish(self, name: impl Into<String>) -> Measurement {
        let end = Instant::now();
        Measurement {
            name: name.into(),
            start_time: millis(self.start.duration_since(self.origin)),
            duration: millis(end.duration_since(self.start)),
        }
    }
}

fn millis(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_brackets_work() {
        let clock = Clock::new();
        let before = clock.now_ms();
        let mark = clock.mark();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let m = mark.finish("perf_measure");

        assert_eq!(m.name, "perf_measure");
        assert!(m.duration >= 2.0);
        assert!(m.start_time >= before);
        assert!(m.end_time() <= clock.now_ms());
    }

    #[test]
    fn test_copied_clock_shares_origin() {
        let clock = Clock::new();
        let copy = clock;
        let a = clock.now_ms();
        let b = copy.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn test_wire_shape() {
        let m = Measurement {
            name: "perf_measure".into(),
            start_time: 1.5,
            duration: 0.25,
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["startTime"], 1.5);
        assert_eq!(json["duration"], 0.25);
        assert_eq!(m.to_string(), "0.250 ms");
    }
}
