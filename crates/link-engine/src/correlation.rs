//! # Correlation Table
//!
//! Outstanding requests keyed by `answer_topic + "_" + message_id`.
//!
//! Removing an entry is what completes it: whoever removes the task (the
//! arriving response, the expiry timer or the abandoning caller) owns its
//! completion, and `DashMap::remove` guarantees only one of them gets it.

use crate::error::EngineError;
use crate::scheduler::TimeoutHandle;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::ArrivedMessage;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

/// Key matching a response to its request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    pub fn new(answer_topic: &str, message_id: &str) -> Self {
        Self(format!("{answer_topic}_{message_id}"))
    }

    /// Key under which an arrived response is looked up.
    pub fn for_response(message: &ArrivedMessage) -> Self {
        Self::new(message.topic(), message.message_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CorrelationKey> for String {
    fn from(key: CorrelationKey) -> Self {
        key.0
    }
}

/// Callback run with the response of a callback-mode request.
pub type ResponseCallback = Box<dyn FnOnce(ArrivedMessage) + Send + 'static>;

/// How a pending request delivers its response.
pub enum Completion {
    /// Wake a waiting caller.
    Future(oneshot::Sender<ArrivedMessage>),
    /// Run a callback on the worker pool. The lock keeps the table `Sync`
    /// for callbacks that are only `Send`.
    Callback(Mutex<ResponseCallback>),
}

impl Completion {
    pub fn callback<F>(callback: F) -> Self
    where
        F: FnOnce(ArrivedMessage) + Send + 'static,
    {
        Self::Callback(Mutex::new(Box::new(callback)))
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Future(_) => f.write_str("Completion::Future"),
            Self::Callback(_) => f.write_str("Completion::Callback"),
        }
    }
}

/// An in-flight request.
#[derive(Debug)]
pub struct PendingTask {
    key: CorrelationKey,
    completion: Completion,
    timeout: Option<TimeoutHandle>,
    created_at: Instant,
}

impl PendingTask {
    pub fn new(key: CorrelationKey, completion: Completion) -> Self {
        Self {
            key,
            completion,
            timeout: None,
            created_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn has_timeout(&self) -> bool {
        self.timeout.is_some()
    }

    /// Cancel the expiry timer, if any, and hand back the completion.
    pub fn into_completion(self) -> Completion {
        if let Some(timeout) = &self.timeout {
            timeout.cancel();
        }
        self.completion
    }
}

/// Concurrent map of pending tasks.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: DashMap<CorrelationKey, PendingTask>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. A live entry under the same key is never replaced.
    pub fn insert(&self, task: PendingTask) -> Result<(), EngineError> {
        match self.pending.entry(task.key.clone()) {
            Entry::Occupied(entry) => Err(EngineError::DuplicateCorrelationKey(
                entry.key().to_string(),
            )),
            Entry::Vacant(entry) => {
                debug!(key = %task.key, "Registered pending request");
                entry.insert(task);
                Ok(())
            }
        }
    }

    /// Remove and return the task. At most one caller ever gets `Some`.
    pub fn remove(&self, key: &CorrelationKey) -> Option<PendingTask> {
        self.pending.remove(key).map(|(_, task)| task)
    }

    /// Store the expiry timer on a task.
    ///
    /// If the task is already gone (completed or expired in the meantime)
    /// the timer is cancelled and `false` is returned.
    pub fn attach_timeout(&self, key: &CorrelationKey, handle: TimeoutHandle) -> bool {
        match self.pending.get_mut(key) {
            Some(mut task) => {
                task.timeout = Some(handle);
                true
            }
            None => {
                handle.cancel();
                false
            }
        }
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Snapshot of the pending keys.
    pub fn keys(&self) -> Vec<CorrelationKey> {
        self.pending.iter().map(|entry| entry.key().clone()).collect()
    }
}
