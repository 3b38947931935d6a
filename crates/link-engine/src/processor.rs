//! # Processor
//!
//! Wires the decoder registry, correlation table, timeout scheduler,
//! dispatch table, reply builder, worker pool and connection lifecycle
//! together.
//!
//! ## Inbound flow
//!
//! ```text
//! transport ──▶ message_arrived ──▶ decode ──┬─ response ──▶ correlation table ──▶ complete
//!                                            └─ command / notification ──▶ dispatch table
//!                                                                              │
//!                                                   worker pool ◀──────────────┘
//!                                                       │
//!                                                       └──▶ reply ──▶ transport
//! ```
//!
//! ## Outbound flow
//!
//! Assign message id, insert pending task, arm timer (callback mode),
//! publish. A failed publish removes the pending task again.

use crate::config::EngineConfig;
use crate::correlation::{Completion, CorrelationKey, CorrelationTable, PendingTask};
use crate::decoder::{DecodeResult, DecoderRegistry};
use crate::dispatch::DispatchTable;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{state_channel, CallbackSlot, ConnectionLifecycle, StateChannel};
use crate::ports::{ConnectCallback, MessageHandler, Transport, TransportListener};
use crate::reply::ReplyBuilder;
use crate::scheduler::TimeoutScheduler;
use crate::stats::EngineStats;
use crate::worker::{isolate, panic_detail, WorkerPool};
use link_telemetry::metrics::{
    HistogramTimer, DECODE_FAILURES, HANDLER_DURATION, HANDLER_FAILURES, MESSAGES_ARRIVED,
    PENDING_REQUESTS, PUBLISH_FAILURES, REPLIES_PUBLISHED, REQUESTS_EXPIRED, RESPONSES_MATCHED,
    RESPONSES_UNMATCHED,
};
use parking_lot::RwLock;
use shared_bus::{EngineEvent, EventPublisher, InMemoryEventBus};
use shared_types::{
    ArrivedMessage, DeliveryMessage, MessageKind, ReplyMessage, RequestMessage, TransportError,
};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Publishes outgoing messages and records the outcome.
#[derive(Clone)]
struct Outbound {
    transport: Arc<dyn Transport>,
    events: Arc<InMemoryEventBus>,
    stats: Arc<EngineStats>,
}

impl Outbound {
    async fn publish(&self, message: DeliveryMessage) -> Result<(), TransportError> {
        let topic = message.topic().unwrap_or_default();
        match self.transport.publish(message).await {
            Ok(()) => Ok(()),
            Err(e) => {
                EngineStats::bump(&self.stats.publish_failures);
                PUBLISH_FAILURES.inc();
                error!(topic = %topic, error = %e, "Failed to publish message");
                self.events.publish(EngineEvent::PublishFailed {
                    topic,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn publish_reply(&self, reply: ReplyMessage) -> Result<(), TransportError> {
        let topic = reply.topic()?;
        let code = reply.code();
        self.publish(DeliveryMessage::Reply(reply)).await?;
        EngineStats::bump(&self.stats.replies_published);
        REPLIES_PUBLISHED.inc();
        debug!(topic = %topic, code, "Reply published");
        self.events
            .publish(EngineEvent::ReplyPublished { topic, code });
        Ok(())
    }
}

/// State handed from one processor to the next when the transport is
/// replaced.
pub struct ProcessorState {
    config: EngineConfig,
    decoders: DecoderRegistry,
    correlation: Arc<CorrelationTable>,
    dispatch: Arc<DispatchTable>,
    callback: CallbackSlot,
    connection: StateChannel,
    events: Arc<InMemoryEventBus>,
    stats: Arc<EngineStats>,
    handle: Option<Handle>,
}

impl ProcessorState {
    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.correlation.len()
    }

    /// Kinds with a registered handler.
    pub fn registered_handlers(&self) -> usize {
        self.dispatch.len()
    }
}

/// Builder for [`Processor`].
#[derive(Default)]
pub struct ProcessorBuilder {
    config: EngineConfig,
    decoders: Option<DecoderRegistry>,
    handle: Option<Handle>,
}

impl ProcessorBuilder {
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the standard decoders.
    #[must_use]
    pub fn decoders(mut self, decoders: DecoderRegistry) -> Self {
        self.decoders = Some(decoders);
        self
    }

    /// Run timers and jobs on this runtime instead of the current one.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn build(self, transport: Arc<dyn Transport>) -> EngineResult<Processor> {
        self.config.validate()?;
        let state = ProcessorState {
            events: Arc::new(InMemoryEventBus::with_capacity(
                self.config.event_channel_capacity,
            )),
            config: self.config,
            decoders: self.decoders.unwrap_or_else(DecoderRegistry::standard),
            correlation: Arc::new(CorrelationTable::new()),
            dispatch: Arc::new(DispatchTable::new()),
            callback: Arc::new(RwLock::new(None)),
            connection: state_channel(),
            stats: Arc::new(EngineStats::default()),
            handle: self.handle,
        };
        Processor::assemble(state, transport)
    }
}

/// The correlation and dispatch engine.
pub struct Processor {
    config: EngineConfig,
    decoders: DecoderRegistry,
    correlation: Arc<CorrelationTable>,
    dispatch: Arc<DispatchTable>,
    scheduler: TimeoutScheduler,
    pool: WorkerPool,
    lifecycle: ConnectionLifecycle,
    replies: ReplyBuilder,
    outbound: Outbound,
    events: Arc<InMemoryEventBus>,
    stats: Arc<EngineStats>,
}

impl Processor {
    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::default()
    }

    fn assemble(state: ProcessorState, transport: Arc<dyn Transport>) -> EngineResult<Self> {
        let handle = match state.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| EngineError::NoRuntime(e.to_string()))?,
        };
        let pool = WorkerPool::new(handle.clone(), state.config.max_concurrent_jobs);
        let lifecycle = ConnectionLifecycle::new(
            transport.clone(),
            pool.clone(),
            state.events.clone(),
            state.callback,
            state.connection,
        );
        Ok(Self {
            replies: ReplyBuilder::new(state.config.reply_code_policy),
            outbound: Outbound {
                transport,
                events: state.events.clone(),
                stats: state.stats.clone(),
            },
            config: state.config,
            decoders: state.decoders,
            correlation: state.correlation,
            dispatch: state.dispatch,
            scheduler: TimeoutScheduler::new(handle),
            pool,
            lifecycle,
            events: state.events,
            stats: state.stats,
        })
    }

    /// Take the tables, callback, connection state, event bus and counters
    /// for a new processor. This processor should be dropped afterwards.
    pub fn carry_over(&self) -> ProcessorState {
        ProcessorState {
            config: self.config.clone(),
            decoders: self.decoders.clone(),
            correlation: self.correlation.clone(),
            dispatch: self.dispatch.clone(),
            callback: self.lifecycle.callback_slot(),
            connection: self.lifecycle.state_channel(),
            events: self.events.clone(),
            stats: self.stats.clone(),
            handle: Some(self.pool.handle().clone()),
        }
    }

    /// Build a processor over a new transport from carried-over state.
    ///
    /// Requests pending at the time are not resent; they complete if their
    /// response still arrives, otherwise they expire. The connection state
    /// restarts at disconnected on the same channel, so callers waiting for
    /// connectivity are woken by the new transport.
    pub fn rebuild(state: ProcessorState, transport: Arc<dyn Transport>) -> EngineResult<Self> {
        info!(
            pending = state.correlation.len(),
            handlers = state.dispatch.len(),
            client = %transport.client_id(),
            "Rebuilding processor over new transport"
        );
        let processor = Self::assemble(state, transport)?;
        processor.lifecycle.reset();
        Ok(processor)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub fn register_handler(&self, kind: MessageKind, handler: Arc<dyn MessageHandler>) {
        self.dispatch.register(kind, handler);
    }

    pub fn remove_handler(&self, kind: &MessageKind) -> bool {
        self.dispatch.remove(kind).is_some()
    }

    pub fn set_connect_callback(&self, callback: Option<Arc<dyn ConnectCallback>>) {
        self.lifecycle.set_callback(callback);
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Assign a message id if needed and compute the correlation key.
    fn prepare(&self, mut request: RequestMessage) -> EngineResult<(RequestMessage, CorrelationKey)> {
        if request.message_id().is_none() {
            request.set_message_id(self.outbound.transport.next_message_id());
        }
        // Fail on unaddressable requests before anything is registered.
        request.topic()?;
        let answer_topic = request.answer_topic()?;
        let key = CorrelationKey::new(&answer_topic, request.message_id().unwrap_or_default());
        Ok((request, key))
    }

    fn register(&self, task: PendingTask) -> EngineResult<()> {
        self.correlation.insert(task)?;
        PENDING_REQUESTS.inc();
        EngineStats::bump(&self.stats.requests_sent);
        Ok(())
    }

    /// Publish a registered request, removing the pending task again if the
    /// transport rejects it.
    async fn publish_registered(
        &self,
        request: RequestMessage,
        key: &CorrelationKey,
    ) -> EngineResult<()> {
        if let Err(e) = self.outbound.publish(DeliveryMessage::Request(request)).await {
            if let Some(task) = self.correlation.remove(key) {
                drop(task.into_completion());
                PENDING_REQUESTS.dec();
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Send a request; `callback` runs once on the worker pool when the
    /// response arrives. If none arrives within `timeout` the request is
    /// dropped and the callback never runs.
    pub async fn send_with_callback<F>(
        &self,
        request: RequestMessage,
        callback: F,
        timeout: Duration,
    ) -> EngineResult<CorrelationKey>
    where
        F: FnOnce(ArrivedMessage) + Send + 'static,
    {
        let (request, key) = self.prepare(request)?;
        self.register(PendingTask::new(
            key.clone(),
            Completion::callback(callback),
        ))?;

        // Armed only after the insert succeeded, so a rejected duplicate
        // never expires the live entry.
        let table = self.correlation.clone();
        let events = self.events.clone();
        let stats = self.stats.clone();
        let expired_key = key.clone();
        let after_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let timer = self.scheduler.schedule(timeout, move || {
            expire(&table, &events, &stats, expired_key, after_ms);
        });
        self.correlation.attach_timeout(&key, timer);

        self.publish_registered(request, &key).await?;
        debug!(key = %key, timeout_ms = after_ms, "Request published with callback");
        Ok(key)
    }

    /// Send a request and get a future for its response. There is no
    /// built-in deadline; see [`Processor::abandon`].
    pub async fn send_for_future(&self, request: RequestMessage) -> EngineResult<ResponseFuture> {
        let (request, key) = self.prepare(request)?;
        let (tx, rx) = oneshot::channel();
        self.register(PendingTask::new(key.clone(), Completion::Future(tx)))?;
        // Built before publishing so a caller dropping the send also
        // releases the pending task.
        let future = ResponseFuture {
            key: key.clone(),
            rx: Some(rx),
            correlation: self.correlation.clone(),
            stats: self.stats.clone(),
        };
        self.publish_registered(request, &key).await?;
        debug!(key = %key, "Request published");
        Ok(future)
    }

    /// Publish a request without waiting for its response.
    pub async fn fast_publish(&self, request: RequestMessage) -> EngineResult<()> {
        let (request, _) = self.prepare(request)?;
        self.outbound
            .publish(DeliveryMessage::Request(request))
            .await
            .map_err(EngineError::from)
    }

    /// Give up on a pending request. Returns false if it already completed
    /// or expired.
    pub fn abandon(&self, key: &CorrelationKey) -> bool {
        match self.correlation.remove(key) {
            Some(task) => {
                drop(task.into_completion());
                PENDING_REQUESTS.dec();
                EngineStats::bump(&self.stats.requests_abandoned);
                debug!(key = %key, "Pending request abandoned");
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    fn process_arrived(&self, topic: &str, payload: &[u8]) {
        let Some(DecodeResult {
            message,
            path_params,
        }) = self.decoders.decode(topic, payload)
        else {
            EngineStats::bump(&self.stats.decode_failures);
            DECODE_FAILURES.inc();
            error!(topic, payload_len = payload.len(), "Decode failed, no decoder matched");
            self.events.publish(EngineEvent::DecodeFailed {
                topic: topic.to_string(),
            });
            return;
        };

        if message.is_response() {
            self.complete_response(message);
        } else {
            self.dispatch_inbound(message, path_params);
        }
    }

    fn complete_response(&self, message: ArrivedMessage) {
        let key = CorrelationKey::for_response(&message);
        let Some(task) = self.correlation.remove(&key) else {
            EngineStats::bump(&self.stats.responses_unmatched);
            RESPONSES_UNMATCHED.inc();
            error!(key = %key, "No request answers the response");
            self.events.publish(EngineEvent::UnmatchedResponse {
                key: key.to_string(),
                topic: message.topic().to_string(),
                message_id: message.message_id().to_string(),
            });
            return;
        };

        EngineStats::bump(&self.stats.responses_matched);
        RESPONSES_MATCHED.inc();
        PENDING_REQUESTS.dec();
        debug!(key = %key, age_ms = task.age().as_millis(), "Response matched");
        self.events.publish(EngineEvent::RequestCompleted {
            key: key.to_string(),
        });

        match task.into_completion() {
            Completion::Future(tx) => {
                if tx.send(message).is_err() {
                    debug!(key = %key, "Caller stopped waiting before the response arrived");
                }
            }
            Completion::Callback(callback) => {
                let callback = callback.into_inner();
                self.pool.execute("response_callback", move || callback(message));
            }
        }
    }

    fn dispatch_inbound(&self, message: ArrivedMessage, path: Vec<String>) {
        match self.dispatch.lookup(message.kind()) {
            Some(handler) => self.run_handler(handler, message, path),
            None if message.expects_reply() => {
                warn!(
                    kind = %message.kind(),
                    message_id = message.message_id(),
                    "No handler registered for command"
                );
                let reply = self.replies.not_registered(&message, &path);
                let outbound = self.outbound.clone();
                self.pool.spawn(async move {
                    send_synthesized(&outbound, reply).await;
                });
            }
            None => {
                debug!(kind = %message.kind(), topic = message.topic(), "No handler, dropping notification");
            }
        }
    }

    fn run_handler(&self, handler: Arc<dyn MessageHandler>, message: ArrivedMessage, path: Vec<String>) {
        let outbound = self.outbound.clone();
        let replies = self.replies;

        self.pool.spawn(async move {
            let job_message = message.clone();
            let job_path = path.clone();
            let outcome = isolate(move || {
                let _timer = HistogramTimer::new(&HANDLER_DURATION);
                handler.on_message(&job_message, &job_path)
            })
            .await;

            let failure = match outcome {
                Ok(Ok(Some(reply))) => {
                    let bound = replies.bind(reply, &message, &path);
                    if let Some(code) = bound.reserved_code {
                        warn!(
                            code,
                            message_id = message.message_id(),
                            policy = ?replies.policy(),
                            "Handler reply uses a protocol-reserved code"
                        );
                        outbound.events.publish(EngineEvent::ReservedReplyCode {
                            code,
                            message_id: message.message_id().to_string(),
                        });
                    }
                    // Failure already logged by the outbound path.
                    let _ = outbound.publish_reply(bound.reply).await;
                    return;
                }
                Ok(Ok(None)) => {
                    debug!(kind = %message.kind(), message_id = message.message_id(), "Handler returned no reply");
                    return;
                }
                Ok(Err(e)) => format!("{e:#}"),
                Err(detail) => detail,
            };

            EngineStats::bump(&outbound.stats.handler_failures);
            HANDLER_FAILURES.inc();
            error!(
                kind = %message.kind(),
                message_id = message.message_id(),
                detail = %failure,
                "Command handler failed"
            );
            outbound.events.publish(EngineEvent::HandlerFailed {
                kind: message.kind().clone(),
                message_id: message.message_id().to_string(),
                detail: failure.clone(),
            });

            if message.expects_reply() {
                let reply = replies.execution_failed(&message, &path, &failure);
                send_synthesized(&outbound, reply).await;
            }
        });
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn correlation(&self) -> &CorrelationTable {
        &self.correlation
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn lifecycle(&self) -> &ConnectionLifecycle {
        &self.lifecycle
    }

    pub fn events(&self) -> &Arc<InMemoryEventBus> {
        &self.events
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn pending_count(&self) -> usize {
        self.correlation.len()
    }
}

impl TransportListener for Processor {
    fn message_arrived(&self, topic: &str, payload: &[u8]) {
        EngineStats::bump(&self.stats.messages_arrived);
        MESSAGES_ARRIVED.inc();

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.process_arrived(topic, payload))) {
            error!(
                topic,
                detail = %panic_detail(panic),
                "Contained internal error while processing arrived message"
            );
        }
    }

    fn connection_lost(&self, cause: &str) {
        self.lifecycle.connection_lost(cause);
    }

    fn connect_complete(&self, reconnect: bool, server_uri: &str) {
        self.lifecycle.connect_complete(reconnect, server_uri);
    }

    fn connect_failed(&self, reason_code: i32) {
        self.lifecycle.connect_failed(reason_code);
    }
}

/// Timer action: remove the task if it is still there.
fn expire(
    table: &CorrelationTable,
    events: &InMemoryEventBus,
    stats: &EngineStats,
    key: CorrelationKey,
    after_ms: u64,
) {
    if table.remove(&key).is_none() {
        return;
    }
    EngineStats::bump(&stats.requests_expired);
    REQUESTS_EXPIRED.inc();
    PENDING_REQUESTS.dec();
    warn!(key = %key, after_ms, "Request expired without a response");
    events.publish(EngineEvent::RequestExpired {
        key: key.into(),
        after_ms,
    });
}

/// Send an engine-generated error reply; a failure here has nowhere left to
/// go but the log.
async fn send_synthesized(outbound: &Outbound, reply: ReplyMessage) {
    let message_id = reply.message_id().to_string();
    if let Err(e) = outbound.publish_reply(reply).await {
        error!(message_id = %message_id, error = %e, "Contained internal error: failed to send error reply");
    }
}

/// Resolves with the response to a request sent by
/// [`Processor::send_for_future`].
///
/// Dropping it before the response arrives abandons the request.
#[derive(Debug)]
pub struct ResponseFuture {
    key: CorrelationKey,
    rx: Option<oneshot::Receiver<ArrivedMessage>>,
    correlation: Arc<CorrelationTable>,
    stats: Arc<EngineStats>,
}

impl ResponseFuture {
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Block the current thread until the response arrives. Must not be
    /// called from inside an async context.
    pub fn blocking_wait(mut self) -> EngineResult<ArrivedMessage> {
        let rx = self.rx.take().ok_or(EngineError::Cancelled)?;
        rx.blocking_recv().map_err(|_| EngineError::Cancelled)
    }
}

impl Future for ResponseFuture {
    type Output = EngineResult<ArrivedMessage>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(Err(EngineError::Cancelled));
        };
        Pin::new(rx)
            .poll(cx)
            .map(|result| result.map_err(|_| EngineError::Cancelled))
    }
}

impl Drop for ResponseFuture {
    fn drop(&mut self) {
        // Gone already if the response arrived or the request was abandoned.
        if let Some(task) = self.correlation.remove(&self.key) {
            drop(task.into_completion());
            PENDING_REQUESTS.dec();
            EngineStats::bump(&self.stats.requests_abandoned);
            debug!(key = %self.key, "Response future dropped, pending request released");
        }
    }
}
