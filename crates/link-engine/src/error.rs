//! Engine error types.

use crate::config::ConfigError;
use shared_types::{MessageError, TransportError};
use thiserror::Error;

/// Errors returned to callers of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The transport failed to publish the outgoing message
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The outgoing message could not be addressed or encoded
    #[error("message error: {0}")]
    Message(#[from] MessageError),

    /// A request with the same answer topic and message id is still pending
    #[error("request already pending for correlation key {0}")]
    DuplicateCorrelationKey(String),

    /// The pending request was dropped before a response arrived
    #[error("request cancelled before a response arrived")]
    Cancelled,

    /// No response arrived within the caller's deadline
    #[error("no response for {key} after {after_ms}ms")]
    Timeout { key: String, after_ms: u64 },

    /// The engine was started outside a Tokio runtime
    #[error("no Tokio runtime available: {0}")]
    NoRuntime(String),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;
