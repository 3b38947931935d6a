//! # Worker Pool
//!
//! Executes user code (handlers, connect callbacks, response callbacks) off
//! the transport thread. Jobs are Tokio tasks bounded by a semaphore; the
//! user code itself runs on the blocking pool so a slow or panicking job
//! cannot stall or take down the runtime.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    max_jobs: usize,
}

impl WorkerPool {
    pub fn new(handle: Handle, max_jobs: usize) -> Self {
        let max_jobs = max_jobs.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_jobs)),
            max_jobs,
        }
    }

    /// Run an async job once a slot is free.
    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        self.handle.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!("Worker pool closed, dropping job");
                return;
            };
            job.await;
        });
    }

    /// Run a synchronous job, logging instead of propagating a panic.
    pub fn execute<F>(&self, label: &'static str, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(async move {
            if let Err(detail) = isolate(job).await {
                error!(job = label, detail = %detail, "Worker job panicked");
            }
        });
    }

    /// Jobs currently holding a slot.
    pub fn active_jobs(&self) -> usize {
        self.max_jobs - self.permits.available_permits()
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Run `job` on the blocking pool and return its result, or the panic
/// message if it panicked.
pub async fn isolate<F, R>(job: F) -> Result<R, String>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(value) => Ok(value),
        Err(e) if e.is_panic() => Err(panic_detail(e.into_panic())),
        Err(e) => Err(e.to_string()),
    }
}

/// Human-readable text of a panic payload.
pub fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
