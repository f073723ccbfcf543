//! Prometheus metrics for the bridge.
//!
//! All metrics follow the naming convention: `bridge_<metric>[_<unit>]`
//!
//! Relay counts are owned by the bridge (`BridgeStats`) and mirrored here as
//! gauges by the host's reporter task.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::TelemetryError;

/// Label value for the remote to local direction.
pub const INBOUND: &str = "inbound";
/// Label value for the local to remote direction.
pub const OUTBOUND: &str = "outbound";

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Relay outcomes, mirrored from the bridge counters
    pub static ref RELAY_MESSAGES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("bridge_relay_messages", "Messages seen by the relays, by outcome"),
        &["direction", "outcome"]  // direction: inbound/outbound
    ).expect("metric creation failed");

    /// 1 while the remote channel is ready
    pub static ref CHANNEL_READY: IntGauge = IntGauge::new(
        "bridge_channel_ready",
        "Whether the remote channel is ready (1) or not (0)"
    ).expect("metric creation failed");

    /// Transport errors seen by the error observer
    pub static ref TRANSPORT_ERRORS: IntCounter = IntCounter::new(
        "bridge_transport_errors_total",
        "Total transport errors reported by the remote channel"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Fails if called twice.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RELAY_MESSAGES.clone()),
        Box::new(CHANNEL_READY.clone()),
        Box::new(TRANSPORT_ERRORS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }
    Ok(())
}

/// Set one relay outcome gauge.
pub fn set_relay_count(direction: &str, outcome: &str, value: u64) {
    RELAY_MESSAGES
        .with_label_values(&[direction, outcome])
        .set(i64::try_from(value).unwrap_or(i64::MAX));
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
