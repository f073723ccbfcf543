//! Shared events, handlers and instance helpers.

use async_trait::async_trait;
use pubsub_bridge::{
    BridgeApi, BridgeHandle, ConnectionConfig, EventBridge, InMemoryPubSub, ReceiveConfig,
};
use serde::{Deserialize, Serialize};
use shared_bus::{EventHandler, HandlerError, InMemoryEventBus};
use shared_types::{Event, Origin};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Project used by every scenario.
pub const PROJECT: &str = "proj";
/// Topic name used by every scenario.
pub const TOPIC_NAME: &str = "orders";
/// Full resource name of [`TOPIC_NAME`].
pub const TOPIC: &str = "projects/proj/topics/orders";

/// Upper bound for any wait in a scenario.
pub const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    pub order_id: String,
}

impl OrderPlaced {
    pub fn new(order_id: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
        }
    }
}

impl Event for OrderPlaced {
    const NAME: &'static str = "OrderPlaced";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderShipped {
    pub order_id: String,
    pub carrier: String,
}

impl Event for OrderShipped {
    const NAME: &'static str = "OrderShipped";
}

/// One delivery seen by a [`Recorder`]: the event and the initiator, if remote.
pub type Delivery<E> = (E, Option<String>);

/// Forwards every handled event to a channel.
pub struct Recorder<E> {
    sink: mpsc::UnboundedSender<Delivery<E>>,
}

impl<E> Recorder<E> {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Delivery<E>>) {
        let (sink, deliveries) = mpsc::unbounded_channel();
        (Arc::new(Self { sink }), deliveries)
    }
}

#[async_trait]
impl<E: Event + Clone> EventHandler for Recorder<E> {
    type Event = E;

    async fn handle(&self, event: &E, origin: Option<&Origin>) -> Result<(), HandlerError> {
        self.sink
            .send((event.clone(), origin.map(|o| o.initiator().to_string())))
            .map_err(|e| HandlerError::new(e.to_string()))
    }
}

/// Always fails.
pub struct Failing;

#[async_trait]
impl EventHandler for Failing {
    type Event = OrderPlaced;

    async fn handle(&self, _event: &OrderPlaced, _origin: Option<&Origin>) -> Result<(), HandlerError> {
        Err(HandlerError::new("refusing every order"))
    }
}

/// A bridge instance and its local bus.
pub struct Instance {
    pub bus: Arc<InMemoryEventBus>,
    pub bridge: EventBridge<InMemoryPubSub>,
}

impl Instance {
    /// Unconnected instance on `pubsub`.
    pub fn new(pubsub: &InMemoryPubSub) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let bridge = EventBridge::with_receive_config(
            bus.clone(),
            Arc::new(pubsub.clone()),
            ReceiveConfig::for_testing(),
        );
        Self { bus, bridge }
    }

    /// Connected instance with identity `identity`.
    pub async fn connected(pubsub: &InMemoryPubSub, identity: &str) -> Self {
        let instance = Self::new(pubsub);
        instance
            .bridge
            .initialize(config(identity))
            .await
            .expect("initialize");
        instance
    }

    /// Start the relays.
    pub async fn start(&self) -> BridgeHandle {
        self.bridge.start().await.expect("start")
    }
}

/// Connection config for `identity` on the shared topic.
pub fn config(identity: &str) -> ConnectionConfig {
    ConnectionConfig::new(PROJECT, TOPIC_NAME, identity)
}

/// Poll `condition` until it holds or [`WAIT`] elapses.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Give in-flight relays a moment, for asserting that nothing arrives.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
