//! # Bridge Telemetry
//!
//! Logging and metrics for the Pub/Sub bridge host.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an env filter and JSON or pretty output
//! - **Metrics**: Prometheus registry with relay, readiness and transport error metrics
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_telemetry::{TelemetryConfig, init_telemetry};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BRIDGE_SERVICE_NAME` | `pubsub-bridge` | Service name in logs |
//! | `BRIDGE_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` takes precedence) |
//! | `BRIDGE_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `BRIDGE_LOG_SOURCE` | `false` | File and line in log lines |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use logging::{env_filter, init_logging};
pub use metrics::{
    encode_metrics, register_metrics, set_relay_count, CHANNEL_READY, INBOUND, OUTBOUND,
    RELAY_MESSAGES, TRANSPORT_ERRORS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Metric registration or encoding failed.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// The log filter did not parse.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so early log lines can already be counted against them.
    register_metrics()?;
    init_logging(&config)?;

    tracing::info!(service = %config.service_name, "Telemetry initialized");
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Keeps telemetry active. Logs a final line on drop.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    /// Service name telemetry was initialized with.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
