//! # Outbound Requests
//!
//! A device → cloud message that expects a response. The request knows both
//! the topic it is published on and the answer topic its response arrives on;
//! the two together with the message id form the correlation key.

use crate::errors::MessageError;
use crate::kind::{MessageClass, MessageKind};
use crate::message::DeviceIdentity;
use serde::Serialize;
use serde_json::Value;

/// Protocol version stamped on every request body.
pub const DEFAULT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    kind: MessageKind,
    message_id: Option<String>,
    identity: DeviceIdentity,
    topic_args: Vec<String>,
    method: Option<String>,
    version: String,
    params: Value,
    topic: Option<String>,
    answer_topic: Option<String>,
}

#[derive(Serialize)]
struct RequestBody<'a> {
    id: &'a str,
    version: &'a str,
    method: &'a str,
    params: &'a Value,
}

impl RequestMessage {
    /// Create a request of `kind` for the given device.
    ///
    /// Topic arguments default to `[product_key, device_key]`.
    pub fn new(kind: MessageKind, identity: DeviceIdentity) -> Self {
        let method = kind.default_method().map(str::to_string);
        Self {
            kind,
            message_id: None,
            identity,
            topic_args: Vec::new(),
            method,
            version: DEFAULT_VERSION.to_string(),
            params: Value::Null,
            topic: None,
            answer_topic: None,
        }
    }

    /// Request with explicit topics, for kinds without a template.
    pub fn custom(
        name: impl Into<String>,
        topic: impl Into<String>,
        answer_topic: impl Into<String>,
    ) -> Self {
        let mut request = Self::new(
            MessageKind::custom(name, MessageClass::Request),
            DeviceIdentity::default(),
        );
        request.topic = Some(topic.into());
        request.answer_topic = Some(answer_topic.into());
        request
    }

    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Full list of template arguments, replacing the identity default.
    #[must_use]
    pub fn with_topic_args<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.topic_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn with_answer_topic(mut self, topic: impl Into<String>) -> Self {
        self.answer_topic = Some(topic.into());
        self
    }

    /// Set the message id in place; used by the engine when assigning ids.
    pub fn set_message_id(&mut self, id: impl Into<String>) {
        self.message_id = Some(id.into());
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    fn effective_args(&self) -> Vec<String> {
        if self.topic_args.is_empty() {
            vec![
                self.identity.product_key.clone(),
                self.identity.device_key.clone(),
            ]
        } else {
            self.topic_args.clone()
        }
    }

    /// Topic the request is published on.
    pub fn topic(&self) -> Result<String, MessageError> {
        if let Some(topic) = &self.topic {
            return Ok(topic.clone());
        }
        let template = self
            .kind
            .topic_template()
            .ok_or_else(|| MessageError::MissingTopic {
                kind: self.kind.to_string(),
            })?;
        template.render(&self.effective_args())
    }

    /// Topic the response to this request arrives on.
    pub fn answer_topic(&self) -> Result<String, MessageError> {
        if let Some(topic) = &self.answer_topic {
            return Ok(topic.clone());
        }
        match self
            .kind
            .response_kind()
            .and_then(|response| response.topic_template())
        {
            Some(template) => template.render(&self.effective_args()),
            None => Ok(format!("{}_reply", self.topic()?)),
        }
    }

    /// JSON body `{"id", "version", "method", "params"}`.
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        let id = self
            .message_id
            .as_deref()
            .ok_or(MessageError::MissingMessageId)?;
        let body = RequestBody {
            id,
            version: &self.version,
            method: self.method.as_deref().unwrap_or_default(),
            params: &self.params,
        };
        serde_json::to_vec(&body).map_err(|e| MessageError::Encode(e.to_string()))
    }
}
