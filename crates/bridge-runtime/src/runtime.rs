//! # Bridge Runtime
//!
//! ## Startup Sequence
//!
//! 1. Connect the bridge (`initialize`). A missing topic or bad config stops here.
//! 2. Register the demo handlers on the local bus.
//! 3. Start the relays. The registry now knows every handled event type.
//! 4. Start the metrics reporter, error observer and optional demo publisher.

use anyhow::{Context, Result};
use pubsub_bridge::{BridgeApi, BridgeHandle, EventBridge, PubSubTransport, ReceiveConfig};
use shared_bus::InMemoryEventBus;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::RuntimeConfig;
use crate::demo::spawn_demo_publisher;
use crate::events::{LicenseUpgradeHandler, UserCreatedHandler};
use crate::reporter::{
    record_channel_state, record_stats, spawn_error_observer, spawn_metrics_reporter,
};

/// One bridged service instance.
pub struct BridgeRuntime<T: PubSubTransport> {
    config: RuntimeConfig,
    bus: Arc<InMemoryEventBus>,
    bridge: Arc<EventBridge<T>>,
    user_created: Arc<UserCreatedHandler>,
    license_upgrades: Arc<LicenseUpgradeHandler>,
    relays: Mutex<Option<BridgeHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<T: PubSubTransport> BridgeRuntime<T> {
    /// Create a runtime over `transport`.
    pub fn new(config: RuntimeConfig, transport: Arc<T>) -> Self {
        Self::with_receive_config(config, transport, ReceiveConfig::default())
    }

    /// Create a runtime with explicit receive settings.
    pub fn with_receive_config(
        config: RuntimeConfig,
        transport: Arc<T>,
        receive_config: ReceiveConfig,
    ) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let bridge = Arc::new(EventBridge::with_receive_config(
            bus.clone(),
            transport,
            receive_config,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            bus,
            bridge,
            user_created: Arc::new(UserCreatedHandler::default()),
            license_upgrades: Arc::new(LicenseUpgradeHandler::default()),
            relays: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Connect, register handlers and start relaying.
    pub async fn start(&self) -> Result<()> {
        let identity = self.config.connection.subscription_name.clone();
        info!("===========================================");
        info!("  Pub/Sub Bridge Runtime v{}", pubsub_bridge::VERSION);
        info!("  Identity: {}", identity);
        info!("===========================================");

        // Step 1: connect
        self.bridge
            .initialize(self.config.connection.clone())
            .await
            .context("Failed to connect the remote channel")?;
        record_channel_state(self.bridge.channel_state());

        // Step 2: handlers must be registered before start() builds the registry
        let mut tasks = self.tasks.lock().await;
        tasks.push(
            self.bus
                .register_handler("user-created", self.user_created.clone()),
        );
        tasks.push(
            self.bus
                .register_handler("license-upgrades", self.license_upgrades.clone()),
        );

        // Step 3: relays
        let handle = self
            .bridge
            .start()
            .await
            .context("Failed to start the event bridge")?;
        *self.relays.lock().await = Some(handle);

        // Step 4: background tasks
        tasks.push(spawn_metrics_reporter(
            self.bridge.clone(),
            self.config.metrics_interval,
            self.shutdown_rx.clone(),
        ));
        tasks.push(spawn_error_observer(
            self.bridge.channel().errors(),
            self.shutdown_rx.clone(),
        ));
        if let Some(interval) = self.config.demo_publish_interval {
            tasks.push(spawn_demo_publisher(
                self.bus.clone(),
                identity,
                interval,
                self.shutdown_rx.clone(),
            ));
        }

        info!(topic = %self.config.connection.topic_name, "Bridge runtime running");
        Ok(())
    }

    /// Stop background tasks and relays, then disconnect.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        if let Some(handle) = self.relays.lock().await.take() {
            handle.shutdown().await;
        }
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        self.bridge.channel().disconnect();
        record_stats(&self.bridge.stats());
        record_channel_state(self.bridge.channel_state());

        info!("Shutdown complete");
    }

    /// The local bus.
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    /// The bridge.
    pub fn bridge(&self) -> &Arc<EventBridge<T>> {
        &self.bridge
    }

    /// Handler for `UserCreated`.
    pub fn user_created_handler(&self) -> &UserCreatedHandler {
        &self.user_created
    }

    /// Handler for `UserLicenseUpgraded`.
    pub fn license_upgrade_handler(&self) -> &LicenseUpgradeHandler {
        &self.license_upgrades
    }
}
