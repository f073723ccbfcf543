//! Telemetry configuration from environment variables.

use std::env;

/// Default service name in log lines.
pub const DEFAULT_SERVICE_NAME: &str = "pubsub-bridge";

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to include file and line in log lines
    pub with_source_location: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_source_location: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BRIDGE_SERVICE_NAME`: Service name (default: pubsub-bridge)
    /// - `BRIDGE_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `BRIDGE_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `BRIDGE_LOG_SOURCE`: Include file and line (default: false)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("BRIDGE_SERVICE_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string()),

            log_level: env::var("BRIDGE_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("BRIDGE_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            with_source_location: env::var("BRIDGE_LOG_SOURCE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    /// Name a configuration after one bridge instance.
    pub fn for_instance(instance: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("{}-{}", config.service_name, instance);
        config
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
