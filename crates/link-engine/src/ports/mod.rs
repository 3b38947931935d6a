//! # Ports Layer
//!
//! - **Driving Port (Inbound):** [`TransportListener`], called by the transport
//! - **Driven Ports (Outbound):** [`Transport`], [`MessageHandler`] and
//!   [`ConnectCallback`], supplied by the host application

pub mod inbound;
pub mod outbound;

pub use inbound::TransportListener;
pub use outbound::{ConnectCallback, MessageHandler, Transport};
