//! # Device Client
//!
//! Application-facing wrapper around a [`Processor`]. Holds the processor
//! behind a lock so the transport can be replaced without the application
//! losing its handle.

use crate::config::EngineConfig;
use crate::correlation::CorrelationKey;
use crate::decoder::DecoderRegistry;
use crate::error::{EngineError, EngineResult};
use crate::ports::{ConnectCallback, MessageHandler, Transport, TransportListener};
use crate::processor::Processor;
use crate::stats::StatsSnapshot;
use parking_lot::RwLock;
use shared_bus::{EventFilter, EventStream, Subscription};
use shared_types::{ArrivedMessage, ConnectionState, MessageKind, ReplyMessage, RequestMessage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct DeviceClient {
    processor: RwLock<Arc<Processor>>,
}

impl DeviceClient {
    /// Client with the default configuration over `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> EngineResult<Self> {
        Self::with_config(EngineConfig::default(), transport)
    }

    pub fn with_config(config: EngineConfig, transport: Arc<dyn Transport>) -> EngineResult<Self> {
        Ok(Self::from_processor(
            Processor::builder().config(config).build(transport)?,
        ))
    }

    /// Client with custom decoders, e.g. the standard set plus
    /// product-specific topics.
    pub fn with_decoders(
        config: EngineConfig,
        decoders: DecoderRegistry,
        transport: Arc<dyn Transport>,
    ) -> EngineResult<Self> {
        Ok(Self::from_processor(
            Processor::builder()
                .config(config)
                .decoders(decoders)
                .build(transport)?,
        ))
    }

    pub fn from_processor(processor: Processor) -> Self {
        Self {
            processor: RwLock::new(Arc::new(processor)),
        }
    }

    fn current(&self) -> Arc<Processor> {
        self.processor.read().clone()
    }

    /// The listener the transport must report to. Changes on
    /// [`DeviceClient::rebuild`].
    pub fn listener(&self) -> Arc<dyn TransportListener> {
        self.current()
    }

    // =========================================================================
    // Handlers and callbacks
    // =========================================================================

    /// Register a closure for an inbound kind, replacing any previous one.
    pub fn register_handler<F>(&self, kind: MessageKind, handler: F)
    where
        F: Fn(&ArrivedMessage, &[String]) -> anyhow::Result<Option<ReplyMessage>>
            + Send
            + Sync
            + 'static,
    {
        self.register_message_handler(kind, Arc::new(handler));
    }

    pub fn register_message_handler(&self, kind: MessageKind, handler: Arc<dyn MessageHandler>) {
        if !kind.class().is_inbound() {
            warn!(kind = %kind, "Registering a handler for a kind that never arrives");
        }
        self.current().register_handler(kind, handler);
    }

    /// Returns false if no handler was registered.
    pub fn remove_handler(&self, kind: &MessageKind) -> bool {
        self.current().remove_handler(kind)
    }

    pub fn set_connect_callback<C>(&self, callback: C)
    where
        C: ConnectCallback + 'static,
    {
        self.current()
            .set_connect_callback(Some(Arc::new(callback)));
    }

    pub fn clear_connect_callback(&self) {
        self.current().set_connect_callback(None);
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Send a request and wait for its response, at most the configured
    /// request timeout.
    pub async fn request(&self, request: RequestMessage) -> EngineResult<ArrivedMessage> {
        let timeout = self.current().config().request_timeout();
        self.request_within(request, timeout).await
    }

    /// Send a request and wait for its response, at most `timeout`. On
    /// timeout, or if this future is dropped, the request is abandoned; a
    /// later response counts as unmatched.
    pub async fn request_within(
        &self,
        request: RequestMessage,
        timeout: Duration,
    ) -> EngineResult<ArrivedMessage> {
        let future = self.current().send_for_future(request).await?;
        let key = future.key().clone();

        // The response future releases its pending task when dropped.
        match tokio::time::timeout(timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                key: key.into(),
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Send a request; `callback` runs once with the response if it arrives
    /// within the configured callback timeout.
    pub async fn request_with_callback<F>(
        &self,
        request: RequestMessage,
        callback: F,
    ) -> EngineResult<CorrelationKey>
    where
        F: FnOnce(ArrivedMessage) + Send + 'static,
    {
        let timeout = self.current().config().callback_timeout();
        self.request_with_callback_within(request, callback, timeout)
            .await
    }

    pub async fn request_with_callback_within<F>(
        &self,
        request: RequestMessage,
        callback: F,
        timeout: Duration,
    ) -> EngineResult<CorrelationKey>
    where
        F: FnOnce(ArrivedMessage) + Send + 'static,
    {
        self.current()
            .send_with_callback(request, callback, timeout)
            .await
    }

    /// Publish without expecting an answer.
    pub async fn fast_publish(&self, request: RequestMessage) -> EngineResult<()> {
        self.current().fast_publish(request).await
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Record that the transport started connecting.
    pub fn connecting(&self) {
        self.current().lifecycle().begin_connect();
    }

    /// Record that the transport was closed on purpose.
    pub fn close(&self) {
        self.current().lifecycle().disconnected();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.current().lifecycle().state()
    }

    pub fn is_connected(&self) -> bool {
        self.current().lifecycle().is_connected()
    }

    /// Wait until connected or `timeout` elapses. Returns whether connected.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let processor = self.current();
        processor.lifecycle().wait_connected(timeout).await
    }

    /// Replace the transport. Handlers, the connect callback, pending
    /// requests, events and stats carry over; the new processor starts
    /// disconnected and pending requests are not resent.
    pub fn rebuild(&self, transport: Arc<dyn Transport>) -> EngineResult<()> {
        let mut slot = self.processor.write();
        let state = slot.carry_over();
        let pending = state.pending_requests();
        *slot = Arc::new(Processor::rebuild(state, transport)?);
        info!(pending, "Client rebuilt over new transport");
        Ok(())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn events(&self, filter: EventFilter) -> Subscription {
        self.current().events().subscribe(filter)
    }

    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        self.current().events().event_stream(filter)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.current().stats().snapshot()
    }

    pub fn pending_requests(&self) -> usize {
        self.current().pending_count()
    }

    pub fn config(&self) -> EngineConfig {
        self.current().config().clone()
    }
}
