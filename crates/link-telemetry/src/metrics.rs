//! Prometheus metrics for the correlation and dispatch engine.
//!
//! All metrics follow the naming convention: `link_<area>_<metric>_<unit>`
//! and live in the crate's own [`REGISTRY`]. Each metric registers itself
//! the first time it is touched.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry,
    TextEncoder,
};

use crate::TelemetryError;

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric creation failed");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric registration failed");
    counter
}

fn gauge(name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("metric creation failed");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("metric registration failed");
    gauge
}

lazy_static! {
    /// Registry holding every engine metric
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Raw messages handed to the engine by the transport
    pub static ref MESSAGES_ARRIVED: IntCounter = counter(
        "link_inbound_messages_arrived_total",
        "Messages delivered by the transport"
    );

    /// Messages no decoder recognised
    pub static ref DECODE_FAILURES: IntCounter = counter(
        "link_inbound_decode_failures_total",
        "Arrived messages dropped because no decoder matched"
    );

    // =========================================================================
    // CORRELATION
    // =========================================================================

    /// Responses that completed a pending request
    pub static ref RESPONSES_MATCHED: IntCounter = counter(
        "link_correlation_responses_matched_total",
        "Responses matched to a pending request"
    );

    /// Responses with no pending request (late or duplicate)
    pub static ref RESPONSES_UNMATCHED: IntCounter = counter(
        "link_correlation_responses_unmatched_total",
        "Responses for which no request was pending"
    );

    /// Pending requests removed by their timeout
    pub static ref REQUESTS_EXPIRED: IntCounter = counter(
        "link_correlation_requests_expired_total",
        "Requests that expired before a response arrived"
    );

    /// Requests currently waiting for a response
    pub static ref PENDING_REQUESTS: IntGauge = gauge(
        "link_correlation_pending_requests",
        "Requests currently waiting for a response"
    );

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Handler errors and panics
    pub static ref HANDLER_FAILURES: IntCounter = counter(
        "link_dispatch_handler_failures_total",
        "Command handlers that returned an error or panicked"
    );

    /// Time spent inside user handlers
    pub static ref HANDLER_DURATION: Histogram = {
        let histogram = Histogram::with_opts(
            HistogramOpts::new(
                "link_dispatch_handler_duration_seconds",
                "Time spent running command handlers"
            ).buckets(exponential_buckets(0.0005, 2.0, 14).expect("bucket layout"))
        ).expect("metric creation failed");
        REGISTRY
            .register(Box::new(histogram.clone()))
            .expect("metric registration failed");
        histogram
    };

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Replies handed to the transport
    pub static ref REPLIES_PUBLISHED: IntCounter = counter(
        "link_outbound_replies_published_total",
        "Replies published to the transport"
    );

    /// Outgoing messages the transport rejected
    pub static ref PUBLISH_FAILURES: IntCounter = counter(
        "link_outbound_publish_failures_total",
        "Outgoing messages the transport failed to publish"
    );
}

/// Force registration of every metric so they appear in the exposition
/// output before their first use.
pub fn register_metrics() {
    lazy_static::initialize(&MESSAGES_ARRIVED);
    lazy_static::initialize(&DECODE_FAILURES);
    lazy_static::initialize(&RESPONSES_MATCHED);
    lazy_static::initialize(&RESPONSES_UNMATCHED);
    lazy_static::initialize(&REQUESTS_EXPIRED);
    lazy_static::initialize(&PENDING_REQUESTS);
    lazy_static::initialize(&HANDLER_FAILURES);
    lazy_static::initialize(&HANDLER_DURATION);
    lazy_static::initialize(&REPLIES_PUBLISHED);
    lazy_static::initialize(&PUBLISH_FAILURES);
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    register_metrics();
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
