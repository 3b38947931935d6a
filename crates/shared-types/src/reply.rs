//! # Outbound Replies
//!
//! A device → cloud answer to a command. Handlers build the business part
//! (code, message, data); the correlation part (message id, identity, topic)
//! is copied from the originating command by [`ReplyMessage::correlate`].

use crate::codes;
use crate::errors::MessageError;
use crate::kind::MessageKind;
use crate::message::{ArrivedMessage, DeviceIdentity};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyMessage {
    kind: Option<MessageKind>,
    message_id: String,
    identity: DeviceIdentity,
    code: i32,
    message: String,
    data: Value,
    topic_args: Vec<String>,
    topic: Option<String>,
}

#[derive(Serialize)]
struct ReplyBody<'a> {
    id: &'a str,
    code: i32,
    message: &'a str,
    data: &'a Value,
}

impl ReplyMessage {
    /// Reply with the given status code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message_id: String::new(),
            identity: DeviceIdentity::default(),
            code,
            message: message.into(),
            data: Value::Null,
            topic_args: Vec::new(),
            topic: None,
        }
    }

    /// Reply carrying [`codes::SUCCESS`].
    pub fn success() -> Self {
        Self::new(codes::SUCCESS, "")
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Publish on `topic` instead of the topic derived from the command.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Copy correlation fields from `command`.
    ///
    /// Message id, identity and topic args always come from the command. Kind
    /// and topic are filled only if the handler did not set them.
    #[must_use]
    pub fn correlate(mut self, command: &ArrivedMessage, path: &[String]) -> Self {
        self.message_id = command.message_id().to_string();
        self.identity = command.identity().clone();
        self.topic_args = path.to_vec();
        if self.kind.is_none() {
            self.kind = command.kind().reply_kind();
        }
        if self.topic.is_none() {
            self.topic = Some(command.reply_topic(path));
        }
        self
    }

    pub fn kind(&self) -> Option<&MessageKind> {
        self.kind.as_ref()
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn topic_args(&self) -> &[String] {
        &self.topic_args
    }

    /// Topic the reply is published on.
    pub fn topic(&self) -> Result<String, MessageError> {
        self.topic.clone().ok_or_else(|| MessageError::MissingTopic {
            kind: self
                .kind
                .as_ref()
                .map_or_else(|| "reply".to_string(), ToString::to_string),
        })
    }

    /// JSON body `{"id", "code", "message", "data"}`.
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        if self.message_id.is_empty() {
            return Err(MessageError::MissingMessageId);
        }
        let body = ReplyBody {
            id: &self.message_id,
            code: self.code,
            message: &self.message,
            data: &self.data,
        };
        serde_json::to_vec(&body).map_err(|e| MessageError::Encode(e.to_string()))
    }
}
