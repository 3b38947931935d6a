//! Shared fixtures for the integration flows.

use async_trait::async_trait;
use link_engine::{ConnectCallback, DeviceClient, EngineConfig, Transport};
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_types::{DeliveryMessage, ReplyMessage, RequestMessage, TransportError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

// =============================================================================
// RECORDING TRANSPORT
// =============================================================================

/// Transport that keeps everything published and can be told to fail.
pub struct RecordingTransport {
    name: String,
    published: Mutex<Vec<DeliveryMessage>>,
    ids: AtomicU64,
    fail_publish: AtomicBool,
    cache_clears: AtomicUsize,
}

impl RecordingTransport {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            published: Mutex::new(Vec::new()),
            ids: AtomicU64::new(0),
            fail_publish: AtomicBool::new(false),
            cache_clears: AtomicUsize::new(0),
        })
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<DeliveryMessage> {
        self.published.lock().clone()
    }

    pub fn replies(&self) -> Vec<ReplyMessage> {
        self.published()
            .iter()
            .filter_map(|m| m.as_reply().cloned())
            .collect()
    }

    pub fn requests(&self) -> Vec<RequestMessage> {
        self.published()
            .iter()
            .filter_map(|m| m.as_request().cloned())
            .collect()
    }

    pub fn cache_clears(&self) -> usize {
        self.cache_clears.load(Ordering::SeqCst)
    }

    /// Poll until at least `count` replies were published or `within`
    /// elapses; returns what was seen.
    pub async fn wait_for_replies(&self, count: usize, within: Duration) -> Vec<ReplyMessage> {
        let deadline = Instant::now() + within;
        loop {
            let replies = self.replies();
            if replies.len() >= count || Instant::now() >= deadline {
                return replies;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn publish(&self, message: DeliveryMessage) -> Result<(), TransportError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Publish {
                topic: message.topic().unwrap_or_default(),
                reason: "broker unreachable".into(),
            });
        }
        message.encode()?;
        self.published.lock().push(message);
        Ok(())
    }

    fn next_message_id(&self) -> String {
        (self.ids.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn clear_subscription_cache(&self) {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
    }

    fn client_id(&self) -> String {
        self.name.clone()
    }
}

// =============================================================================
// CONNECT CALLBACK
// =============================================================================

/// Forwards every notification to a channel as a short label.
pub struct ChannelCallback(pub mpsc::UnboundedSender<String>);

impl ConnectCallback for ChannelCallback {
    fn on_connect_success(&self) {
        let _ = self.0.send("success".into());
    }

    fn on_connect_lost(&self) {
        let _ = self.0.send("lost".into());
    }

    fn on_connect_failed(&self, reason_code: i32) {
        let _ = self.0.send(format!("failed:{reason_code}"));
    }
}

// =============================================================================
// WIRE HELPERS
// =============================================================================

pub fn response_body(id: &str, code: i32, data: Value) -> Vec<u8> {
    json!({"id": id, "code": code, "message": "", "data": data})
        .to_string()
        .into_bytes()
}

pub fn command_body(id: &str, method: &str, params: Value) -> Vec<u8> {
    json!({"id": id, "version": "1.0", "method": method, "params": params})
        .to_string()
        .into_bytes()
}

pub fn client_with(config: EngineConfig) -> (DeviceClient, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new("test-device");
    let client = DeviceClient::with_config(config, transport.clone()).unwrap();
    (client, transport)
}

pub fn client() -> (DeviceClient, Arc<RecordingTransport>) {
    client_with(EngineConfig::default())
}

pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>, within: Duration) -> Option<T> {
    tokio::time::timeout(within, rx.recv()).await.ok().flatten()
}
