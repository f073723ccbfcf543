//! # Pub/Sub Bridge Runtime
//!
//! Runs one bridged service instance until ctrl-c.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics)
//! 2. Load configuration from the environment
//! 3. Build the REST transport
//! 4. Start the runtime (connect, handlers, relays)
//! 5. Wait for ctrl-c, then shut down

use anyhow::{Context, Result};
use bridge_runtime::{BridgeRuntime, RuntimeConfig};
use bridge_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use pubsub_bridge::RestPubSub;
use std::sync::Arc;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env().context("Invalid bridge configuration")?;

    let mut transport =
        RestPubSub::new(&config.connection).context("Failed to build Pub/Sub client")?;
    if let Some(token) = &config.access_token {
        transport = transport.with_access_token(token.clone());
    }
    info!(base_url = %transport.base_url(), "Pub/Sub transport ready");

    let runtime = BridgeRuntime::new(config, Arc::new(transport));
    runtime.start().await?;

    info!("Bridge is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    if let Ok(metrics) = encode_metrics() {
        debug!(%metrics, "Final metrics");
    }

    Ok(())
}
