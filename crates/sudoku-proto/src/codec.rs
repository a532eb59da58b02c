//! Converters between protocol messages and their wire form.
//!
//! Every message is a JSON array whose first element is the tag:
//!
//! | Direction | Wire form |
//! |-----------|-----------|
//! | to worker | `["init"]`, `["solve", puzzle, rules?]`, `["cancel"]`, `["terminate"]` |
//! | to orchestrator | `["ready"]`, `["progress", value]`, `["solved", solution, measurement]` |
//! | to orchestrator | `["load_failed", message]`, `["solve_failed", error]`, `["rejected", command, reason]`, `["aborted"]` |
//!
//! Older workers acknowledged `init` by echoing `["init"]`; that form is
//! still decoded as [`Event::Ready`].

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::vec::IntoIter;

use crate::error::ProtoError;
use crate::message::{Command, Event};

/// A message with a `[tag, ...payload]` wire form.
pub trait WireMessage: Sized {
    /// Convert to the wire array.
    fn to_wire(&self) -> Result<Value, ProtoError>;

    /// Parse from a wire array.
    fn from_wire(value: Value) -> Result<Self, ProtoError>;
}

/// Encode a message as a JSON string.
pub fn encode<M: WireMessage>(message: &M) -> Result<String, ProtoError> {
    Ok(serde_json::to_string(&message.to_wire()?)?)
}

/// Decode a message from a JSON string.
pub fn decode<M: WireMessage>(text: &str) -> Result<M, ProtoError> {
    M::from_wire(serde_json::from_str(text)?)
}

/// Payload cursor over a wire array, after the tag.
struct Frame {
    tag: String,
    payload: IntoIter<Value>,
}

impl Frame {
    fn split(value: Value) -> Result<Self, ProtoError> {
        let Value::Array(items) = value else {
            return Err(ProtoError::MalformedMessage("expected an array".to_string()));
        };
        let mut payload = items.into_iter();
        match payload.next() {
            Some(Value::String(tag)) => Ok(Self { tag, payload }),
            Some(other) => Err(ProtoError::MalformedMessage(format!(
                "tag must be a string, got {}",
                other
            ))),
            None => Err(ProtoError::MalformedMessage("empty array".to_string())),
        }
    }

    /// Next required payload element.
    fn required<T: DeserializeOwned>(
        &mut self,
        tag: &'static str,
        field: &'static str,
    ) -> Result<T, ProtoError> {
        let value = self
            .payload
            .next()
            .ok_or(ProtoError::MissingField { tag, field })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Next optional payload element; absent and `null` both mean `None`.
    fn optional<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ProtoError> {
        match self.payload.next() {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}

impl WireMessage for Command {
    fn to_wire(&self) -> Result<Value, ProtoError> {
        Ok(match self {
            Command::Solve {
                puzzle,
                rules: Some(rules),
            } => json!([self.tag(), puzzle, rules]),
            Command::Solve { puzzle, rules: None } => json!([self.tag(), puzzle]),
            Command::Init | Command::Cancel | Command::Terminate => json!([self.tag()]),
        })
    }

    fn from_wire(value: Value) -> Result<Self, ProtoError> {
        let mut frame = Frame::split(value)?;
        let tag = std::mem::take(&mut frame.tag);
        match tag.as_str() {
            "init" => Ok(Command::Init),
            "solve" => Ok(Command::Solve {
                puzzle: frame.required("solve", "puzzle")?,
                rules: frame.optional()?,
            }),
            "cancel" => Ok(Command::Cancel),
            "terminate" => Ok(Command::Terminate),
            _ => Err(ProtoError::UnknownTag(tag.clone())),
        }
    }
}

impl WireMessage for Event {
    fn to_wire(&self) -> Result<Value, ProtoError> {
        let tag = self.tag();
        Ok(match self {
            Event::Ready | Event::Aborted => json!([tag]),
            Event::Progress { value } => json!([tag, value]),
            Event::Solved {
                solution,
                measurement,
            } => json!([tag, solution, serde_json::to_value(measurement)?]),
            Event::LoadFailed { message } => json!([tag, message]),
            Event::SolveFailed { error } => json!([tag, serde_json::to_value(error)?]),
            Event::Rejected { command, reason } => json!([tag, command, reason]),
        })
    }

    fn from_wire(value: Value) -> Result<Self, ProtoError> {
        let mut frame = Frame::split(value)?;
        let tag = std::mem::take(&mut frame.tag);
        match tag.as_str() {
            "ready" | "init" => Ok(Event::Ready),
            "progress" => Ok(Event::Progress {
                value: frame.required("progress", "value")?,
            }),
            "solved" => Ok(Event::Solved {
                solution: frame.required("solved", "solution")?,
                measurement: frame.required("solved", "measurement")?,
            }),
            "load_failed" => Ok(Event::LoadFailed {
                message: frame.required("load_failed", "message")?,
            }),
            "solve_failed" => Ok(Event::SolveFailed {
                error: frame.required("solve_failed", "error")?,
            }),
            "rejected" => Ok(Event::Rejected {
                command: frame.required("rejected", "command")?,
                reason: frame.required("rejected", "reason")?,
            }),
            "aborted" => Ok(Event::Aborted),
            _ => Err(ProtoError::UnknownTag(tag.clone())),
        }
    }
}
