//! # Error Types
//!
//! Errors raised while building, rendering or encoding messages, and the
//! error type transports report back to the engine.

use thiserror::Error;

/// Errors related to message construction and encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// Wrong number of arguments supplied to a topic template.
    #[error("Topic template {template} takes {expected} argument(s), got {actual}")]
    TopicArity {
        template: String,
        expected: usize,
        actual: usize,
    },

    /// The kind has no topic template and no explicit topic was set.
    #[error("No topic known for message kind {kind}")]
    MissingTopic { kind: String },

    /// An outbound message was encoded before it received a message id.
    #[error("Message id has not been assigned")]
    MissingMessageId,

    /// The message carried a different kind than the caller expected.
    #[error("Unexpected message kind: expected {expected}, got {actual}")]
    UnexpectedKind { expected: String, actual: String },

    /// JSON payload could not be produced.
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// JSON payload could not be read.
    #[error("Decoding failed: {0}")]
    Decode(String),
}

/// Errors reported by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport has no live connection.
    #[error("Transport is not connected")]
    NotConnected,

    /// The publish call was rejected or failed on the wire.
    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// The outbound message could not be turned into a wire payload.
    #[error("Outbound message invalid: {0}")]
    InvalidMessage(#[from] MessageError),

    /// The transport was shut down.
    #[error("Transport closed")]
    Closed,
}
