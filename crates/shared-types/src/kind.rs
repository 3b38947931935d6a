//! # Message Kinds
//!
//! The closed set of built-in message kinds plus an open `Custom` variant.
//! Each kind knows its class, its topic template and, where applicable, its
//! paired response or reply kind.

use crate::topic::TopicTemplate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction and role of a message in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageClass {
    /// Device → cloud, expects a response.
    Request,
    /// Cloud → device, answers a request.
    Response,
    /// Cloud → device, expects a reply.
    Command,
    /// Device → cloud, answers a command.
    Reply,
    /// Cloud → device, fire-and-forget.
    Notification,
}

impl MessageClass {
    /// Returns true for classes the device receives.
    #[must_use]
    pub fn is_inbound(self) -> bool {
        matches!(self, Self::Response | Self::Command | Self::Notification)
    }
}

/// Tag identifying what a message is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    // Device requests and their responses
    MeasurepointPostRequest,
    MeasurepointPostResponse,
    EventPostRequest,
    EventPostResponse,
    SubDeviceLoginRequest,
    SubDeviceLoginResponse,
    SubDeviceLogoutRequest,
    SubDeviceLogoutResponse,
    TopoAddRequest,
    TopoAddResponse,

    // Cloud commands and their replies
    ServiceInvocationCommand,
    ServiceInvocationReply,
    MeasurepointSetCommand,
    MeasurepointSetReply,
    DeviceActivateInfoCommand,
    DeviceActivateInfoReply,

    // Fire-and-forget notifications
    SubDeviceDisableNotice,

    /// Application-defined kind; its topic comes from a custom decoder or an
    /// explicit topic on the outbound message.
    Custom { name: String, class: MessageClass },
}

impl MessageKind {
    /// Create an application-defined kind.
    pub fn custom(name: impl Into<String>, class: MessageClass) -> Self {
        Self::Custom {
            name: name.into(),
            class,
        }
    }

    /// Every built-in kind the device can receive, in decoding priority order.
    ///
    /// More specific templates come first so that e.g. a measurepoint-set
    /// command is not mistaken for a generic service invocation.
    #[must_use]
    pub fn builtin_inbound() -> Vec<MessageKind> {
        vec![
            Self::MeasurepointPostResponse,
            Self::EventPostResponse,
            Self::SubDeviceLoginResponse,
            Self::SubDeviceLogoutResponse,
            Self::TopoAddResponse,
            Self::MeasurepointSetCommand,
            Self::DeviceActivateInfoCommand,
            Self::ServiceInvocationCommand,
            Self::SubDeviceDisableNotice,
        ]
    }

    /// The class of this kind.
    #[must_use]
    pub fn class(&self) -> MessageClass {
        match self {
            Self::MeasurepointPostRequest
            | Self::EventPostRequest
            | Self::SubDeviceLoginRequest
            | Self::SubDeviceLogoutRequest
            | Self::TopoAddRequest => MessageClass::Request,
            Self::MeasurepointPostResponse
            | Self::EventPostResponse
            | Self::SubDeviceLoginResponse
            | Self::SubDeviceLogoutResponse
            | Self::TopoAddResponse => MessageClass::Response,
            Self::ServiceInvocationCommand
            | Self::MeasurepointSetCommand
            | Self::DeviceActivateInfoCommand => MessageClass::Command,
            Self::ServiceInvocationReply
            | Self::MeasurepointSetReply
            | Self::DeviceActivateInfoReply => MessageClass::Reply,
            Self::SubDeviceDisableNotice => MessageClass::Notification,
            Self::Custom { class, .. } => *class,
        }
    }

    /// Topic template for built-in kinds.
    #[must_use]
    pub fn topic_template(&self) -> Option<TopicTemplate> {
        let raw = match self {
            Self::MeasurepointPostRequest => "/sys/{}/{}/thing/measurepoint/post",
            Self::MeasurepointPostResponse => "/sys/{}/{}/thing/measurepoint/post_reply",
            Self::EventPostRequest => "/sys/{}/{}/thing/event/{}/post",
            Self::EventPostResponse => "/sys/{}/{}/thing/event/{}/post_reply",
            Self::SubDeviceLoginRequest => "/ext/session/{}/{}/combine/login",
            Self::SubDeviceLoginResponse => "/ext/session/{}/{}/combine/login_reply",
            Self::SubDeviceLogoutRequest => "/ext/session/{}/{}/combine/logout",
            Self::SubDeviceLogoutResponse => "/ext/session/{}/{}/combine/logout_reply",
            Self::TopoAddRequest => "/sys/{}/{}/thing/topo/add",
            Self::TopoAddResponse => "/sys/{}/{}/thing/topo/add_reply",
            Self::ServiceInvocationCommand => "/sys/{}/{}/thing/service/{}",
            Self::ServiceInvocationReply => "/sys/{}/{}/thing/service/{}_reply",
            Self::MeasurepointSetCommand => "/sys/{}/{}/thing/service/measurepoint/set",
            Self::MeasurepointSetReply => "/sys/{}/{}/thing/service/measurepoint/set_reply",
            Self::DeviceActivateInfoCommand => "/sys/{}/{}/thing/activate/info",
            Self::DeviceActivateInfoReply => "/sys/{}/{}/thing/activate/info_reply",
            Self::SubDeviceDisableNotice => "/ext/session/{}/{}/combine/disable",
            Self::Custom { .. } => return None,
        };
        Some(TopicTemplate::new(raw))
    }

    /// The response kind a request is answered with.
    #[must_use]
    pub fn response_kind(&self) -> Option<MessageKind> {
        match self {
            Self::MeasurepointPostRequest => Some(Self::MeasurepointPostResponse),
            Self::EventPostRequest => Some(Self::EventPostResponse),
            Self::SubDeviceLoginRequest => Some(Self::SubDeviceLoginResponse),
            Self::SubDeviceLogoutRequest => Some(Self::SubDeviceLogoutResponse),
            Self::TopoAddRequest => Some(Self::TopoAddResponse),
            Self::Custom {
                name,
                class: MessageClass::Request,
            } => Some(Self::custom(format!("{name}_reply"), MessageClass::Response)),
            _ => None,
        }
    }

    /// The reply kind a command is answered with.
    #[must_use]
    pub fn reply_kind(&self) -> Option<MessageKind> {
        match self {
            Self::ServiceInvocationCommand => Some(Self::ServiceInvocationReply),
            Self::MeasurepointSetCommand => Some(Self::MeasurepointSetReply),
            Self::DeviceActivateInfoCommand => Some(Self::DeviceActivateInfoReply),
            Self::Custom {
                name,
                class: MessageClass::Command,
            } => Some(Self::custom(format!("{name}_reply"), MessageClass::Reply)),
            _ => None,
        }
    }

    /// Default JSON-RPC style method for outbound requests.
    #[must_use]
    pub fn default_method(&self) -> Option<&'static str> {
        match self {
            Self::MeasurepointPostRequest => Some("thing.measurepoint.post"),
            Self::EventPostRequest => Some("thing.event.post"),
            Self::SubDeviceLoginRequest => Some("combine.login"),
            Self::SubDeviceLogoutRequest => Some("combine.logout"),
            Self::TopoAddRequest => Some("thing.topo.add"),
            _ => None,
        }
    }

    /// Human-readable name of the kind.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::MeasurepointPostRequest => "MeasurepointPostRequest",
            Self::MeasurepointPostResponse => "MeasurepointPostResponse",
            Self::EventPostRequest => "EventPostRequest",
            Self::EventPostResponse => "EventPostResponse",
            Self::SubDeviceLoginRequest => "SubDeviceLoginRequest",
            Self::SubDeviceLoginResponse => "SubDeviceLoginResponse",
            Self::SubDeviceLogoutRequest => "SubDeviceLogoutRequest",
            Self::SubDeviceLogoutResponse => "SubDeviceLogoutResponse",
            Self::TopoAddRequest => "TopoAddRequest",
            Self::TopoAddResponse => "TopoAddResponse",
            Self::ServiceInvocationCommand => "ServiceInvocationCommand",
            Self::ServiceInvocationReply => "ServiceInvocationReply",
            Self::MeasurepointSetCommand => "MeasurepointSetCommand",
            Self::MeasurepointSetReply => "MeasurepointSetReply",
            Self::DeviceActivateInfoCommand => "DeviceActivateInfoCommand",
            Self::DeviceActivateInfoReply => "DeviceActivateInfoReply",
            Self::SubDeviceDisableNotice => "SubDeviceDisableNotice",
            Self::Custom { name, .. } => name,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
