//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive such as `link_engine=debug,info`
    pub log_level: String,

    /// Whether to install a console fmt layer at all
    pub console_output: bool,

    /// Whether the fmt layer writes JSON lines instead of pretty text
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "device-link".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// - `LINK_SERVICE_NAME`: Service name (default: device-link)
    /// - `LINK_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `LINK_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `LINK_JSON_LOGS`: Enable JSON logs (default: false outside containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("LINK_SERVICE_NAME")
                .unwrap_or_else(|_| "device-link".to_string()),

            log_level: env::var("LINK_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("LINK_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v, true))
                .unwrap_or(true),

            json_logs: env::var("LINK_JSON_LOGS")
                .map(|v| parse_flag(&v, false))
                .unwrap_or(is_container),
        }
    }

    /// Same configuration with a different service name.
    #[must_use]
    pub fn for_service(mut self, name: &str) -> Self {
        self.service_name = name.to_string();
        self
    }
}

/// `true`/`1`/`yes` and `false`/`0`/`no`, case-insensitive; anything else
/// falls back to `default`.
fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    }
}
