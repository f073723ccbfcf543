//! # Event Bridge Service
//!
//! Ties the local bus, the remote channel and the two relays together.
//!
//! ## Lifecycle
//!
//! 1. `initialize(config)` connects the channel. The subscription name
//!    becomes this instance's initiator identity.
//! 2. The host registers its handlers on the bus.
//! 3. `start()` builds the registry from those handlers and spawns the
//!    inbound and outbound relays.
//! 4. `BridgeHandle::shutdown()` stops the relays and disconnects the
//!    channel. Another `initialize` then `start` brings the bridge back.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_bus::{EventFilter, EventSubscriber, InMemoryEventBus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use super::channel::RemoteChannel;
use super::relay::{InboundRelay, OutboundRelay};
use super::stats::{BridgeStats, RelayCounters};
use crate::config::{ConnectionConfig, ReceiveConfig};
use crate::domain::{BridgeError, ChannelState, EventTypeRegistry, LoopGuard};
use crate::ports::inbound::BridgeApi;
use crate::ports::outbound::PubSubTransport;

/// Lets a handle release the channel without knowing its transport.
trait Detach: Send + Sync {
    fn detach(&self);
}

impl<T: PubSubTransport> Detach for RemoteChannel<T> {
    fn detach(&self) {
        self.disconnect();
    }
}

/// Running relay tasks.
pub struct BridgeHandle {
    inbound: JoinHandle<()>,
    outbound: JoinHandle<()>,
    channel: Arc<dyn Detach>,
    started: Arc<AtomicBool>,
}

impl BridgeHandle {
    /// True while both relays are running.
    pub fn is_running(&self) -> bool {
        !self.inbound.is_finished() && !self.outbound.is_finished()
    }

    /// Stop both relays and the receive pump.
    ///
    /// Unacknowledged messages stay on the subscription for the next start.
    pub async fn shutdown(self) {
        self.inbound.abort();
        self.outbound.abort();
        let _ = self.inbound.await;
        let _ = self.outbound.await;
        self.channel.detach();
        self.started.store(false, Ordering::SeqCst);
        info!("Event bridge relays stopped");
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("inbound", &self.inbound)
            .field("outbound", &self.outbound)
            .finish_non_exhaustive()
    }
}

/// Bridges one [`InMemoryEventBus`] to one remote topic.
pub struct EventBridge<T: PubSubTransport> {
    bus: Arc<InMemoryEventBus>,
    channel: Arc<RemoteChannel<T>>,
    identity: RwLock<Option<String>>,
    counters: Arc<RelayCounters>,
    started: Arc<AtomicBool>,
}

impl<T: PubSubTransport> EventBridge<T> {
    /// Create a bridge with the default receive settings.
    pub fn new(bus: Arc<InMemoryEventBus>, transport: Arc<T>) -> Self {
        Self::with_receive_config(bus, transport, ReceiveConfig::default())
    }

    /// Create a bridge with explicit receive settings.
    pub fn with_receive_config(
        bus: Arc<InMemoryEventBus>,
        transport: Arc<T>,
        receive_config: ReceiveConfig,
    ) -> Self {
        Self {
            bus,
            channel: Arc::new(RemoteChannel::new(transport, receive_config)),
            identity: RwLock::new(None),
            counters: Arc::new(RelayCounters::default()),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The remote channel, for state and error observers.
    pub fn channel(&self) -> &Arc<RemoteChannel<T>> {
        &self.channel
    }

    /// The local bus.
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }
}

#[async_trait]
impl<T: PubSubTransport> BridgeApi for EventBridge<T> {
    async fn initialize(&self, config: ConnectionConfig) -> Result<(), BridgeError> {
        self.identity.write().take();
        self.channel.connect(&config).await?;
        *self.identity.write() = Some(config.subscription_name);
        Ok(())
    }

    async fn start(&self) -> Result<BridgeHandle, BridgeError> {
        let identity = self.identity().ok_or(BridgeError::NotInitialized)?;
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BridgeError::AlreadyStarted);
        }

        let envelopes = match self.channel.receive() {
            Ok(stream) => stream,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let registry = EventTypeRegistry::from_declarations(&self.bus.handler_declarations());
        info!(
            identity = %identity,
            event_types = ?registry.event_names(),
            "Starting event bridge"
        );

        // Subscribe before spawning so nothing raised after start() is missed.
        // The queue is unbounded: a slow transport delays events, never drops them.
        let local_events = self.bus.subscribe_unbounded(EventFilter::all());
        let guard = LoopGuard::new(identity);

        let inbound = InboundRelay::new(
            Arc::new(registry),
            self.bus.clone(),
            guard.clone(),
            self.counters.clone(),
        );
        let outbound = OutboundRelay::new(self.channel.clone(), guard, self.counters.clone());

        Ok(BridgeHandle {
            inbound: tokio::spawn(inbound.run(envelopes)),
            outbound: tokio::spawn(outbound.run(local_events)),
            channel: self.channel.clone(),
            started: self.started.clone(),
        })
    }

    fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    fn identity(&self) -> Option<String> {
        self.identity.read().clone()
    }

    fn stats(&self) -> BridgeStats {
        self.counters.snapshot()
    }
}
