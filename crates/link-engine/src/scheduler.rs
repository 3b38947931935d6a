//! # Timeout Scheduler
//!
//! Runs a short action once a delay has passed. Used to expire pending
//! requests; the action does a table removal and an event publication and
//! never runs user code.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Handle to a scheduled action. Dropping it does not cancel the action.
#[derive(Debug)]
pub struct TimeoutHandle {
    abort: AbortHandle,
}

impl TimeoutHandle {
    /// Best-effort cancellation. An action that already started runs to
    /// completion; callers must tolerate that.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// True once the action ran or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Timer service on a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TimeoutScheduler {
    handle: Handle,
}

impl TimeoutScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Run `action` after `delay`.
    pub fn schedule<F>(&self, delay: Duration, action: F) -> TimeoutHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });
        TimeoutHandle {
            abort: task.abort_handle(),
        }
    }
}
