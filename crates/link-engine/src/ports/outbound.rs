//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host application provides: the transport the engine
//! publishes through, and the user code the engine calls back into.

use async_trait::async_trait;
use shared_types::{ArrivedMessage, DeliveryMessage, ReplyMessage, TransportError};

/// The publish/subscribe connection the engine sits on.
///
/// Connecting, subscribing, TLS and wire-level reconnection are the
/// implementation's business. It reports what happens on the wire through
/// [`super::TransportListener`].
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct PahoTransport { client: mqtt::AsyncClient, ids: AtomicU64 }
///
/// #[async_trait]
/// impl Transport for PahoTransport {
///     async fn publish(&self, message: DeliveryMessage) -> Result<(), TransportError> {
///         let payload = message.encode()?;
///         self.client.publish(mqtt::Message::new(message.topic()?, payload, 1)).await
///             .map_err(|e| TransportError::Publish { topic: ..., reason: e.to_string() })
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish an outgoing request or reply.
    async fn publish(&self, message: DeliveryMessage) -> Result<(), TransportError>;

    /// Next message id for an outgoing request. Ids must not repeat while a
    /// request using them may still be pending.
    fn next_message_id(&self) -> String;

    /// Forget which topics are subscribed so they are re-subscribed after a
    /// reconnect.
    fn clear_subscription_cache(&self);

    /// Client identifier, used in logs.
    fn client_id(&self) -> String;
}

/// User logic for an inbound command or notification.
///
/// Runs on the worker pool, never on the transport thread. Returning
/// `Ok(None)` sends nothing; `Err` or a panic makes the engine answer a
/// command with an execution-failed reply.
///
/// Implemented for any matching closure:
///
/// ```rust,ignore
/// client.register_handler(MessageKind::ServiceInvocationCommand, |cmd: &ArrivedMessage, _path: &[String]| {
///     Ok(Some(ReplyMessage::success()))
/// });
/// ```
pub trait MessageHandler: Send + Sync {
    fn on_message(
        &self,
        message: &ArrivedMessage,
        path_params: &[String],
    ) -> anyhow::Result<Option<ReplyMessage>>;
}

impl<F> MessageHandler for F
where
    F: Fn(&ArrivedMessage, &[String]) -> anyhow::Result<Option<ReplyMessage>> + Send + Sync,
{
    fn on_message(
        &self,
        message: &ArrivedMessage,
        path_params: &[String],
    ) -> anyhow::Result<Option<ReplyMessage>> {
        self(message, path_params)
    }
}

/// Connection status notifications. All methods run on the worker pool.
pub trait ConnectCallback: Send + Sync {
    /// Connected, including after an automatic reconnect.
    fn on_connect_success(&self) {}

    /// The connection dropped.
    fn on_connect_lost(&self) {}

    /// A connect attempt failed with the broker's reason code.
    fn on_connect_failed(&self, _reason_code: i32) {}
}
