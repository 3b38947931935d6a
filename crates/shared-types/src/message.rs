//! # Arrived Messages
//!
//! The decoded form of every inbound message: responses to device requests,
//! commands expecting a reply, and fire-and-forget notifications.

use crate::errors::MessageError;
use crate::kind::{MessageClass, MessageKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// The device a message is addressed to or sent from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub product_key: String,
    pub device_key: String,
}

impl DeviceIdentity {
    pub fn new(product_key: impl Into<String>, device_key: impl Into<String>) -> Self {
        Self {
            product_key: product_key.into(),
            device_key: device_key.into(),
        }
    }

    /// Identity taken from the first two path params of a `/sys/{pk}/{dk}/...`
    /// style topic; missing params become empty strings.
    #[must_use]
    pub fn from_path(path: &[String]) -> Self {
        Self {
            product_key: path.first().cloned().unwrap_or_default(),
            device_key: path.get(1).cloned().unwrap_or_default(),
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product_key, self.device_key)
    }
}

/// Response body: `{"id", "code", "message", "data"}`.
#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    code: i32,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Command/notification body: `{"id", "version", "method", "params"}`.
#[derive(Debug, Deserialize)]
struct CommandEnvelope {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrivedMessage {
    kind: MessageKind,
    topic: String,
    message_id: String,
    identity: DeviceIdentity,
    code: Option<i32>,
    message: Option<String>,
    method: Option<String>,
    payload: Value,
}

impl ArrivedMessage {
    /// Create a message with an empty payload.
    pub fn new(
        kind: MessageKind,
        topic: impl Into<String>,
        message_id: impl Into<String>,
        identity: DeviceIdentity,
    ) -> Self {
        Self {
            kind,
            topic: topic.into(),
            message_id: message_id.into(),
            identity,
            code: None,
            message: None,
            method: None,
            payload: Value::Null,
        }
    }

    /// Parse a JSON body according to the class of `kind`.
    pub fn from_json(
        kind: MessageKind,
        topic: &str,
        identity: DeviceIdentity,
        body: &[u8],
    ) -> Result<Self, MessageError> {
        match kind.class() {
            MessageClass::Response => {
                let envelope: ResponseEnvelope = serde_json::from_slice(body)
                    .map_err(|e| MessageError::Decode(e.to_string()))?;
                Ok(Self::new(kind, topic, envelope.id, identity)
                    .with_code(envelope.code)
                    .with_text(envelope.message.unwrap_or_default())
                    .with_payload(envelope.data))
            }
            MessageClass::Command | MessageClass::Notification => {
                let envelope: CommandEnvelope = serde_json::from_slice(body)
                    .map_err(|e| MessageError::Decode(e.to_string()))?;
                let mut message =
                    Self::new(kind, topic, envelope.id, identity).with_payload(envelope.params);
                message.method = envelope.method;
                Ok(message)
            }
            MessageClass::Request | MessageClass::Reply => Err(MessageError::Decode(format!(
                "{kind} is an outbound kind and cannot arrive"
            ))),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    #[must_use]
    pub fn with_text(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn class(&self) -> MessageClass {
        self.kind.class()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn product_key(&self) -> &str {
        &self.identity.product_key
    }

    pub fn device_key(&self) -> &str {
        &self.identity.device_key
    }

    /// Status code of a response.
    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Human-readable message of a response.
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Method of a command.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// `data` of a response or `params` of a command.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Deserialize the payload into a concrete type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| MessageError::Decode(e.to_string()))
    }

    pub fn is_response(&self) -> bool {
        self.class() == MessageClass::Response
    }

    /// Commands expect a reply; notifications and responses do not.
    pub fn expects_reply(&self) -> bool {
        self.class() == MessageClass::Command
    }

    /// True for responses carrying the success code.
    pub fn is_success(&self) -> bool {
        self.code == Some(crate::codes::SUCCESS)
    }

    /// Topic a reply to this command is published on.
    ///
    /// Uses the reply kind's template when the path params fit it, otherwise
    /// appends `_reply` to the command topic.
    #[must_use]
    pub fn reply_topic(&self, path: &[String]) -> String {
        self.kind
            .reply_kind()
            .and_then(|reply| reply.topic_template())
            .and_then(|template| template.render(path).ok())
            .unwrap_or_else(|| format!("{}_reply", self.topic))
    }
}
