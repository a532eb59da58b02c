//! Worker protocol for the sudoku offload workspace.
//!
//! This crate contains:
//! - The command and event messages exchanged between the orchestrator and a
//!   worker runtime
//! - The transport-agnostic wire codec, where every message is a JSON array
//!   `[tag, ...payload]`

pub mod codec;
pub mod error;
pub mod message;

// Re-export commonly used types
pub use codec::{decode, encode, WireMessage};
pub use error::ProtoError;
pub use message::{Command, Event, RejectReason};
