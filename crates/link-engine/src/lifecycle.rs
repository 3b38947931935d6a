//! # Connection Lifecycle Manager
//!
//! Tracks connection state and notifies the registered [`ConnectCallback`].
//!
//! ```text
//! Disconnected ──▶ Connecting ──▶ Connected ──▶ Lost ──▶ Connecting
//!       ▲               │                         │
//!       └───────────────┴─────────────────────────┘
//! ```
//!
//! State lives in a `watch` channel so callers can block until connected.
//! The channel outlives the lifecycle: a rebuilt processor takes it over, so
//! callers already waiting are woken by the new transport's connect.
//! Callbacks run on the worker pool, never on the transport thread.

use crate::ports::{ConnectCallback, Transport};
use crate::worker::WorkerPool;
use parking_lot::{Mutex, RwLock};
use shared_bus::{EngineEvent, EventPublisher, InMemoryEventBus};
use shared_types::ConnectionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Broker reason code for a rejected username/password or token.
pub const NOT_AUTHORIZED: i32 = 5;

/// Shared slot holding the current connect callback.
pub type CallbackSlot = Arc<RwLock<Option<Arc<dyn ConnectCallback>>>>;

/// Shared sender holding the current connection state.
pub type StateChannel = Arc<watch::Sender<ConnectionState>>;

/// A fresh state channel, starting disconnected.
pub fn state_channel() -> StateChannel {
    Arc::new(watch::Sender::new(ConnectionState::Disconnected))
}

pub struct ConnectionLifecycle {
    state: StateChannel,
    transition: Mutex<()>,
    callback: CallbackSlot,
    transport: Arc<dyn Transport>,
    pool: WorkerPool,
    events: Arc<InMemoryEventBus>,
}

impl ConnectionLifecycle {
    pub fn new(
        transport: Arc<dyn Transport>,
        pool: WorkerPool,
        events: Arc<InMemoryEventBus>,
        callback: CallbackSlot,
        state: StateChannel,
    ) -> Self {
        Self {
            state,
            transition: Mutex::new(()),
            callback,
            transport,
            pool,
            events,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn set_callback(&self, callback: Option<Arc<dyn ConnectCallback>>) {
        *self.callback.write() = callback;
    }

    pub fn callback_slot(&self) -> CallbackSlot {
        self.callback.clone()
    }

    pub fn state_channel(&self) -> StateChannel {
        self.state.clone()
    }

    fn move_to(&self, to: ConnectionState) -> ConnectionState {
        let from = self.state.send_replace(to);
        if from != to {
            info!(from = %from, to = %to, client = %self.transport.client_id(), "Connection state changed");
            self.events
                .publish(EngineEvent::ConnectionStateChanged { from, to });
        }
        from
    }

    /// Run `f` with the current callback on the worker pool.
    fn notify<F>(&self, label: &'static str, f: F)
    where
        F: FnOnce(&dyn ConnectCallback) + Send + 'static,
    {
        let Some(callback) = self.callback.read().clone() else {
            return;
        };
        self.pool.execute(label, move || f(callback.as_ref()));
    }

    /// A connect attempt started.
    pub fn begin_connect(&self) {
        let _guard = self.transition.lock();
        self.move_to(ConnectionState::Connecting);
    }

    /// Connect or automatic reconnect finished.
    pub fn connect_complete(&self, reconnect: bool, server_uri: &str) {
        let _guard = self.transition.lock();
        self.move_to(ConnectionState::Connected);
        info!(reconnect, server_uri, "Connect complete");
        self.notify("on_connect_success", |callback| callback.on_connect_success());
    }

    /// A connect attempt failed.
    pub fn connect_failed(&self, reason_code: i32) {
        let _guard = self.transition.lock();
        self.move_to(ConnectionState::Disconnected);
        if reason_code == NOT_AUTHORIZED {
            error!(
                reason_code,
                client = %self.transport.client_id(),
                "Connect refused: not authorized, check the device secret or product secret"
            );
        } else {
            error!(reason_code, "Connect failed");
        }
        self.notify("on_connect_failed", move |callback| {
            callback.on_connect_failed(reason_code);
        });
    }

    /// The connection dropped.
    pub fn connection_lost(&self, cause: &str) {
        self.transport.clear_subscription_cache();
        let _guard = self.transition.lock();
        self.move_to(ConnectionState::Lost);
        warn!(cause, "Connection lost");
        self.notify("on_connect_lost", |callback| callback.on_connect_lost());
    }

    /// The transport was replaced and has not connected yet.
    pub fn reset(&self) {
        let _guard = self.transition.lock();
        self.move_to(ConnectionState::Disconnected);
    }

    /// The connection was closed on purpose.
    pub fn disconnected(&self) {
        let _guard = self.transition.lock();
        self.move_to(ConnectionState::Disconnected);
    }

    /// Wait until connected or `timeout` elapses. Returns whether connected.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        let result = tokio::time::timeout(timeout, rx.wait_for(|state| state.is_connected())).await;
        matches!(result, Ok(Ok(_)))
    }
}
