//! Host configuration read from the environment.
//!
//! Every key carries the `EVENT_DISPATCH_` prefix, e.g.
//! `EVENT_DISPATCH_MODE=batch`. Missing keys fall back to their defaults.

use config::{Config, ConfigError, Environment};
use dispatch::DispatchMode;
use serde::{Deserialize, Serialize};

use crate::telemetry::{LogFormat, TelemetryConfig};

/// Environment-variable prefix for every key.
pub const ENV_PREFIX: &str = "EVENT_DISPATCH";

/// Process-wide settings for the function host, read from
/// `EVENT_DISPATCH_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HostConfig {
    /// `single` (sync/event flows) or `batch` (partial batch failures).
    #[serde(default)]
    pub mode: DispatchMode,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `json` or `pretty`.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Service name reported to the OTLP collector.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Export spans over OTLP.
    #[serde(default)]
    pub otel_enabled: bool,

    /// OTLP gRPC endpoint.
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,
}

impl HostConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    /// Loads the configuration from an explicit environment source.
    pub fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// The telemetry part of the configuration.
    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
            log_format: self.log_format,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            service_name: default_service_name(),
            otel_enabled: false,
            otel_endpoint: default_otel_endpoint(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "event-dispatch".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}
