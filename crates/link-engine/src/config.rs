//! Engine configuration with validation.
//!
//! Loaded from TOML, optionally overlaid by `LINK_*` environment variables:
//!
//! ```toml
//! request_timeout_ms = 10000
//! callback_timeout_ms = 10000
//! max_concurrent_jobs = 16
//! event_channel_capacity = 1024
//! reply_code_policy = "lenient"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// What to do with a handler reply whose code is protocol-reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyCodePolicy {
    /// Warn and send the reply unchanged.
    #[default]
    Lenient,
    /// Warn and replace the reply with an execution-failed reply.
    Strict,
}

impl std::str::FromStr for ReplyCodePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(ConfigError::Invalid(format!(
                "unknown reply code policy '{other}'"
            ))),
        }
    }
}

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for `DeviceClient::request`
    pub request_timeout_ms: u64,
    /// Default expiry for callback-mode requests
    pub callback_timeout_ms: u64,
    /// Upper bound on concurrently running user jobs
    pub max_concurrent_jobs: usize,
    /// Buffer size of the diagnostic event bus
    pub event_channel_capacity: usize,
    /// Handling of protocol-reserved codes in handler replies
    pub reply_code_policy: ReplyCodePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            callback_timeout_ms: 10_000,
            max_concurrent_jobs: 16,
            event_channel_capacity: 1024,
            reply_code_policy: ReplyCodePolicy::Lenient,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from `LINK_*` environment variables.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup, keyed like the environment.
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LINK_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_var("LINK_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("LINK_CALLBACK_TIMEOUT_MS") {
            self.callback_timeout_ms = parse_var("LINK_CALLBACK_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("LINK_MAX_CONCURRENT_JOBS") {
            self.max_concurrent_jobs = parse_var("LINK_MAX_CONCURRENT_JOBS", &v)?;
        }
        if let Some(v) = lookup("LINK_REPLY_CODE_POLICY") {
            self.reply_code_policy = v.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout_ms cannot be 0".into(),
            ));
        }
        if self.callback_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "callback_timeout_ms cannot be 0".into(),
            ));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_concurrent_jobs cannot be 0".into(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "event_channel_capacity cannot be 0".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key}: cannot parse '{value}'")))
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {error}")]
    Io { path: String, error: String },
    /// The file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
