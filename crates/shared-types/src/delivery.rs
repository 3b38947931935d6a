//! Everything the engine hands to the transport for publishing.

use crate::errors::MessageError;
use crate::kind::MessageKind;
use crate::reply::ReplyMessage;
use crate::request::RequestMessage;

/// An outbound message ready to be published.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryMessage {
    Request(RequestMessage),
    Reply(ReplyMessage),
}

impl DeliveryMessage {
    pub fn topic(&self) -> Result<String, MessageError> {
        match self {
            Self::Request(request) => request.topic(),
            Self::Reply(reply) => reply.topic(),
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Request(request) => request.message_id(),
            Self::Reply(reply) => Some(reply.message_id()),
        }
    }

    pub fn kind(&self) -> Option<&MessageKind> {
        match self {
            Self::Request(request) => Some(request.kind()),
            Self::Reply(reply) => reply.kind(),
        }
    }

    /// Wire payload.
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        match self {
            Self::Request(request) => request.encode(),
            Self::Reply(reply) => reply.encode(),
        }
    }

    pub fn as_request(&self) -> Option<&RequestMessage> {
        match self {
            Self::Request(request) => Some(request),
            Self::Reply(_) => None,
        }
    }

    pub fn as_reply(&self) -> Option<&ReplyMessage> {
        match self {
            Self::Reply(reply) => Some(reply),
            Self::Request(_) => None,
        }
    }
}

impl From<RequestMessage> for DeliveryMessage {
    fn from(request: RequestMessage) -> Self {
        Self::Request(request)
    }
}

impl From<ReplyMessage> for DeliveryMessage {
    fn from(reply: ReplyMessage) -> Self {
        Self::Reply(reply)
    }
}
