//! # Typed Helpers
//!
//! Thin builders and views over the generic message types for the most
//! common device flows.

use crate::codes;
use crate::errors::MessageError;
use crate::kind::MessageKind;
use crate::message::{ArrivedMessage, DeviceIdentity};
use crate::reply::ReplyMessage;
use crate::request::RequestMessage;
use serde_json::{Map, Value};

/// Builder for a measurepoint post request.
///
/// Produces `params = {"measurepoints": {...}, "time": <millis>}`.
#[derive(Debug, Clone, Default)]
pub struct MeasurepointPostRequest {
    identity: DeviceIdentity,
    points: Map<String, Value>,
    time: Option<u64>,
}

impl MeasurepointPostRequest {
    pub fn builder(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn add_measure_point(mut self, id: impl Into<String>, value: impl Into<Value>) -> Self {
        self.points.insert(id.into(), value.into());
        self
    }

    /// Sample timestamp in milliseconds since the epoch.
    #[must_use]
    pub fn time(mut self, millis: u64) -> Self {
        self.time = Some(millis);
        self
    }

    pub fn build(self) -> RequestMessage {
        let mut params = Map::new();
        params.insert("measurepoints".into(), Value::Object(self.points));
        if let Some(time) = self.time {
            params.insert("time".into(), Value::from(time));
        }
        RequestMessage::new(MessageKind::MeasurepointPostRequest, self.identity)
            .with_params(Value::Object(params))
    }
}

/// View over a sub-device login response.
#[derive(Debug, Clone)]
pub struct SubDeviceLoginResponse<'a> {
    inner: &'a ArrivedMessage,
}

impl<'a> SubDeviceLoginResponse<'a> {
    pub fn view(message: &'a ArrivedMessage) -> Result<Self, MessageError> {
        if *message.kind() != MessageKind::SubDeviceLoginResponse {
            return Err(MessageError::UnexpectedKind {
                expected: MessageKind::SubDeviceLoginResponse.to_string(),
                actual: message.kind().to_string(),
            });
        }
        Ok(Self { inner: message })
    }

    pub fn sub_product_key(&self) -> Option<&str> {
        self.inner.payload().get("productKey").and_then(Value::as_str)
    }

    pub fn sub_device_key(&self) -> Option<&str> {
        self.inner.payload().get("deviceKey").and_then(Value::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.inner.is_success()
    }
}

/// Builder for a service invocation reply; output data goes into `data`.
#[derive(Debug, Clone)]
pub struct ServiceInvocationReply {
    code: i32,
    message: String,
    output: Map<String, Value>,
}

impl Default for ServiceInvocationReply {
    fn default() -> Self {
        Self {
            code: codes::SUCCESS,
            message: String::new(),
            output: Map::new(),
        }
    }
}

impl ServiceInvocationReply {
    pub fn builder() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_output_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.output.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn build(self) -> ReplyMessage {
        ReplyMessage::new(self.code, self.message)
            .with_kind(MessageKind::ServiceInvocationReply)
            .with_data(Value::Object(self.output))
    }
}
