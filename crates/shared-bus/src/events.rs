//! # Engine Events
//!
//! Diagnostic events the correlation and dispatch engine emits. Every
//! contained failure (decode miss, unmatched response, handler fault,
//! publish error) shows up here, so tests and embedding applications can
//! observe behaviour that otherwise only reaches the log.

use serde::{Deserialize, Serialize};
use shared_types::{ConnectionState, MessageKind};

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    // =========================================================================
    // DECODING
    // =========================================================================
    /// No decoder recognised an arrived message; it was dropped.
    DecodeFailed {
        topic: String,
    },

    // =========================================================================
    // CORRELATION
    // =========================================================================
    /// A response arrived for which no request is pending (late, duplicate
    /// or never sent).
    UnmatchedResponse {
        key: String,
        topic: String,
        message_id: String,
    },

    /// A pending request was completed by its response.
    RequestCompleted {
        key: String,
    },

    /// A pending request expired before its response arrived.
    RequestExpired {
        key: String,
        after_ms: u64,
    },

    // =========================================================================
    // DISPATCH
    // =========================================================================
    /// A command handler returned an error or panicked.
    HandlerFailed {
        kind: MessageKind,
        message_id: String,
        detail: String,
    },

    /// A handler reply carried a protocol-reserved status code.
    ReservedReplyCode {
        code: i32,
        message_id: String,
    },

    // =========================================================================
    // TRANSPORT
    // =========================================================================
    /// A reply was handed to the transport successfully.
    ReplyPublished {
        topic: String,
        code: i32,
    },

    /// The transport rejected an outgoing message.
    PublishFailed {
        topic: String,
        reason: String,
    },

    // =========================================================================
    // CONNECTION
    // =========================================================================
    /// The connection lifecycle moved between states.
    ConnectionStateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
}

impl EngineEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::DecodeFailed { .. } => EventTopic::Decoding,
            Self::UnmatchedResponse { .. }
            | Self::RequestCompleted { .. }
            | Self::RequestExpired { .. } => EventTopic::Correlation,
            Self::HandlerFailed { .. } | Self::ReservedReplyCode { .. } => EventTopic::Dispatch,
            Self::ReplyPublished { .. } | Self::PublishFailed { .. } => EventTopic::Transport,
            Self::ConnectionStateChanged { .. } => EventTopic::Connection,
        }
    }

    /// Short, stable name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DecodeFailed { .. } => "decode_failed",
            Self::UnmatchedResponse { .. } => "unmatched_response",
            Self::RequestCompleted { .. } => "request_completed",
            Self::RequestExpired { .. } => "request_expired",
            Self::HandlerFailed { .. } => "handler_failed",
            Self::ReservedReplyCode { .. } => "reserved_reply_code",
            Self::ReplyPublished { .. } => "reply_published",
            Self::PublishFailed { .. } => "publish_failed",
            Self::ConnectionStateChanged { .. } => "connection_state_changed",
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Decoder registry outcomes.
    Decoding,
    /// Correlation table outcomes.
    Correlation,
    /// Command handler outcomes.
    Dispatch,
    /// Outgoing publish outcomes.
    Transport,
    /// Connection lifecycle transitions.
    Connection,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &EngineEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
