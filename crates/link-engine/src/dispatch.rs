//! # Dispatch Table
//!
//! Which handler answers which kind of inbound message. One handler per
//! kind; registering again replaces the previous handler.

use crate::ports::MessageHandler;
use dashmap::DashMap;
use shared_types::MessageKind;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct DispatchTable {
    handlers: DashMap<MessageKind, Arc<dyn MessageHandler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, returning the handler it replaced.
    pub fn register(
        &self,
        kind: MessageKind,
        handler: Arc<dyn MessageHandler>,
    ) -> Option<Arc<dyn MessageHandler>> {
        debug!(kind = %kind, "Registering message handler");
        self.handlers.insert(kind, handler)
    }

    pub fn remove(&self, kind: &MessageKind) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.remove(kind).map(|(_, handler)| handler)
    }

    /// Handler for `kind`, if any. The returned `Arc` is detached from the
    /// table, so the handler may be replaced while it runs.
    pub fn lookup(&self, kind: &MessageKind) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(kind).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, kind: &MessageKind) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<String> = self.handlers.iter().map(|e| e.key().to_string()).collect();
        f.debug_struct("DispatchTable").field("kinds", &kinds).finish()
    }
}
