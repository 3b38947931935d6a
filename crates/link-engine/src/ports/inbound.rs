//! # Driving Ports (Inbound API)
//!
//! The entry points a transport calls when something happens on the wire.

/// Receiver of transport events; implemented by the processor.
///
/// Every method is synchronous and returns quickly: decoding and table
/// lookups happen inline, anything involving user code is handed to the
/// worker pool. Implementations must not panic out of these calls.
pub trait TransportListener: Send + Sync {
    /// A message arrived on a subscribed topic.
    fn message_arrived(&self, topic: &str, payload: &[u8]);

    /// The connection dropped unexpectedly.
    fn connection_lost(&self, cause: &str);

    /// A connect or automatic reconnect finished.
    fn connect_complete(&self, reconnect: bool, server_uri: &str);

    /// A connect attempt was refused or failed.
    fn connect_failed(&self, reason_code: i32);
}
