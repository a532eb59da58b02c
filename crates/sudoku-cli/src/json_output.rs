//! JSON-lines output of worker events to stdout.

use serde::Serialize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use sudoku_proto::{Event, WireMessage};
use tracing::warn;

/// Global flag to enable JSON output mode.
static JSON_MODE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable JSON output mode.
pub fn enable_json_mode() {
    JSON_MODE_ENABLED.store(true, Ordering::SeqCst);
}

/// Check if JSON mode is enabled.
pub fn is_json_mode() -> bool {
    JSON_MODE_ENABLED.load(Ordering::SeqCst)
}

/// One output line: the event in wire form plus context.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: &'static str,
    pub timestamp: String,
    pub worker_id: String,
    pub message: serde_json::Value,
}

impl JsonEvent {
    /// Wrap `event` with the current timestamp.
    pub fn new(worker_id: &str, event: &Event) -> Result<Self, sudoku_proto::ProtoError> {
        Ok(Self {
            event: event.tag(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            worker_id: worker_id.to_string(),
            message: event.to_wire()?,
        })
    }

    /// Output this event as a JSON line to stdout.
    pub fn emit(&self) {
        if !is_json_mode() {
            return;
        }
        if let Ok(json) = serde_json::to_string(self) {
            let mut stdout = io::stdout().lock();
            let _ = writeln!(stdout, "{}", json);
            let _ = stdout.flush();
        }
    }
}

/// Emit `event` if JSON mode is on.
pub fn emit_event(worker_id: &str, event: &Event) {
    if !is_json_mode() {
        return;
    }
    match JsonEvent::new(worker_id, event) {
        Ok(line) => line.emit(),
        Err(e) => warn!(event = event.tag(), error = %e, "Failed to encode event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sudoku_core::Measurement;

    #[test]
    fn test_json_event_carries_wire_form() {
        let line = JsonEvent::new("w-1", &Event::Progress { value: 0.5 }).unwrap();
        let text = serde_json::to_string(&line).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["event"], "progress");
        assert_eq!(value["worker_id"], "w-1");
        assert_eq!(value["message"], serde_json::json!(["progress", 0.5]));
        assert!(chrono::DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_solved_message_uses_camel_case_measurement() {
        let event = Event::Solved {
            solution: sudoku_core::Sudoku::empty(),
            measurement: Measurement {
                name: "perf_measure".to_string(),
                start_time: 1.0,
                duration: 2.5,
            },
        };
        let line = JsonEvent::new("w-1", &event).unwrap();
        assert_eq!(line.message[2]["startTime"], 1.0);
        assert_eq!(line.message[2]["duration"], 2.5);
    }
}
