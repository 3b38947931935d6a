//! # Link Telemetry
//!
//! Logging and metrics for the Device-Link engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use link_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_logging(&config).expect("Failed to init logging");
//!
//! // engine logs and metrics are now being collected
//! println!("{}", link_telemetry::gather_metrics()?);
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LINK_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `LINK_JSON_LOGS` | `false` | JSON log lines |
//! | `LINK_CONSOLE_OUTPUT` | `true` | Install a console layer |
//! | `LINK_SERVICE_NAME` | `device-link` | Service name in logs |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging, LoggingGuard};
pub use metrics::{
    gather_metrics, register_metrics, HistogramTimer, DECODE_FAILURES, HANDLER_DURATION,
    HANDLER_FAILURES, MESSAGES_ARRIVED, PENDING_REQUESTS, PUBLISH_FAILURES, REPLIES_PUBLISHED,
    REQUESTS_EXPIRED, RESPONSES_MATCHED, RESPONSES_UNMATCHED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),

    #[error("Failed to encode metrics: {0}")]
    Metrics(String),
}
