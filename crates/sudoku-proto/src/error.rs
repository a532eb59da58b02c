//! Wire codec errors.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Message is not a non-empty array led by a string tag.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Tag is not part of the protocol.
    #[error("Unknown message tag: {0}")]
    UnknownTag(String),

    /// A required payload element is absent.
    #[error("Message '{tag}' is missing its {field}")]
    MissingField {
        tag: &'static str,
        field: &'static str,
    },
}
