//! # Metrics Reporter
//!
//! Mirrors bridge state into the Prometheus registry.

use bridge_telemetry::{metric_inc, set_relay_count, CHANNEL_READY, INBOUND, OUTBOUND, TRANSPORT_ERRORS};
use pubsub_bridge::{BridgeApi, BridgeStats, ChannelState, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Copy a stats snapshot into the relay gauges.
pub fn record_stats(stats: &BridgeStats) {
    set_relay_count(INBOUND, "received", stats.inbound_received);
    set_relay_count(INBOUND, "delivered", stats.inbound_delivered);
    set_relay_count(INBOUND, "echo_skipped", stats.inbound_echo_skipped);
    set_relay_count(INBOUND, "unknown_type", stats.inbound_unknown_type);
    set_relay_count(INBOUND, "decode_failed", stats.inbound_decode_failed);
    set_relay_count(OUTBOUND, "seen", stats.outbound_seen);
    set_relay_count(OUTBOUND, "published", stats.outbound_published);
    set_relay_count(OUTBOUND, "remote_skipped", stats.outbound_remote_skipped);
    set_relay_count(OUTBOUND, "failed", stats.outbound_failed);
}

/// Set the readiness gauge.
pub fn record_channel_state(state: ChannelState) {
    CHANNEL_READY.set(i64::from(state.is_ready()));
}

/// Refresh metrics every `interval` until shutdown.
pub fn spawn_metrics_reporter<B>(
    bridge: Arc<B>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    B: BridgeApi + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = bridge.stats();
                    record_stats(&stats);
                    record_channel_state(bridge.channel_state());
                    debug!(?stats, "Relay stats");
                }
                _ = shutdown.changed() => {
                    info!("Metrics reporter stopped");
                    break;
                }
            }
        }
    })
}

/// Log and count transport errors until shutdown.
///
/// Errors never stop the bridge; this task only records them.
pub fn spawn_error_observer(
    mut errors: broadcast::Receiver<TransportError>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = errors.recv() => match received {
                    Ok(err) => {
                        metric_inc!(TRANSPORT_ERRORS);
                        error!(error = %err, "Pub/Sub transport error");
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed = missed, "Error observer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.changed() => break,
            }
        }
        debug!("Error observer stopped");
    })
}
