//! # Shared Types Crate
//!
//! Message model shared by every Device-Link crate.
//!
//! ## Design Principles
//!
//! - **Tagged kinds**: every message carries a [`MessageKind`]; dispatch is a
//!   lookup on that tag, never on a runtime type.
//! - **Paired replies**: a command kind knows its reply kind, so a reply can be
//!   built for any command without introspection.
//! - **Topic templates**: topics are rendered from and matched against
//!   [`TopicTemplate`]s, which also yield the ordered path parameters.

pub mod codes;
pub mod connection;
pub mod delivery;
pub mod errors;
pub mod kind;
pub mod message;
pub mod reply;
pub mod request;
pub mod topic;
pub mod typed;

pub use connection::ConnectionState;
pub use delivery::DeliveryMessage;
pub use errors::*;
pub use kind::{MessageClass, MessageKind};
pub use message::{ArrivedMessage, DeviceIdentity};
pub use reply::ReplyMessage;
pub use request::RequestMessage;
pub use topic::TopicTemplate;
