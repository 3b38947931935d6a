//! Per-engine counters.
//!
//! Mirrors the process-wide Prometheus metrics but scoped to one engine
//! instance, so tests and embedding applications can assert on exact
//! numbers.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for one engine
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Raw messages handed over by the transport
    pub messages_arrived: AtomicU64,
    /// Messages no decoder recognised
    pub decode_failures: AtomicU64,
    /// Requests published with a pending task
    pub requests_sent: AtomicU64,
    /// Responses that completed a pending task
    pub responses_matched: AtomicU64,
    /// Responses with no pending task
    pub responses_unmatched: AtomicU64,
    /// Pending tasks removed by their timer
    pub requests_expired: AtomicU64,
    /// Pending tasks removed by their caller
    pub requests_abandoned: AtomicU64,
    /// Handler errors and panics
    pub handler_failures: AtomicU64,
    /// Replies handed to the transport
    pub replies_published: AtomicU64,
    /// Outgoing messages the transport rejected
    pub publish_failures: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub messages_arrived: u64,
    pub decode_failures: u64,
    pub requests_sent: u64,
    pub responses_matched: u64,
    pub responses_unmatched: u64,
    pub requests_expired: u64,
    pub requests_abandoned: u64,
    pub handler_failures: u64,
    pub replies_published: u64,
    pub publish_failures: u64,
}

impl EngineStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_arrived: self.messages_arrived.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            responses_matched: self.responses_matched.load(Ordering::Relaxed),
            responses_unmatched: self.responses_unmatched.load(Ordering::Relaxed),
            requests_expired: self.requests_expired.load(Ordering::Relaxed),
            requests_abandoned: self.requests_abandoned.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            replies_published: self.replies_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}
