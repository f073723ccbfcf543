//! # Relays
//!
//! The two loops a started bridge runs.
//!
//! ```text
//! RemoteChannel ──▶ InboundRelay ──▶ InMemoryEventBus
//! InMemoryEventBus ──▶ OutboundRelay ──▶ RemoteChannel
//! ```
//!
//! Each message is processed on its own. A failure is logged, counted and
//! dropped; the loop carries on.

use shared_bus::{BusMessage, EventPublisher, InMemoryEventBus, Subscription};
use shared_types::{Envelope, Origin};
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::channel::RemoteChannel;
use super::stats::RelayCounters;
use crate::domain::{EventTypeRegistry, LoopGuard, RelayError};
use crate::ports::outbound::PubSubTransport;

/// Result of relaying one inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Published by this instance; not delivered again.
    Echo,
    /// Republished on the local bus.
    Delivered {
        /// Local subscribers reached
        receivers: usize,
    },
}

/// Result of relaying one local bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundOutcome {
    /// Came from the remote side; not sent back.
    RemoteOrigin,
    /// Handed to the transport.
    Published {
        /// Transport message id
        message_id: String,
    },
}

/// Remote to local.
pub struct InboundRelay {
    registry: Arc<EventTypeRegistry>,
    bus: Arc<InMemoryEventBus>,
    guard: LoopGuard,
    counters: Arc<RelayCounters>,
}

impl InboundRelay {
    pub(crate) fn new(
        registry: Arc<EventTypeRegistry>,
        bus: Arc<InMemoryEventBus>,
        guard: LoopGuard,
        counters: Arc<RelayCounters>,
    ) -> Self {
        Self {
            registry,
            bus,
            guard,
            counters,
        }
    }

    /// Relay one envelope onto the local bus.
    pub async fn relay(&self, envelope: Envelope) -> Result<InboundOutcome, RelayError> {
        RelayCounters::bump(&self.counters.inbound_received);
        let event_name = envelope.event_name.clone();
        let initiator = envelope.event_initiator.clone();

        let result = self.deliver(envelope).await;
        match &result {
            Ok(InboundOutcome::Echo) => {
                RelayCounters::bump(&self.counters.inbound_echo_skipped);
                debug!(event_name = %event_name, "Skipping envelope published by this instance");
            }
            Ok(InboundOutcome::Delivered { receivers }) => {
                RelayCounters::bump(&self.counters.inbound_delivered);
                debug!(
                    event_name = %event_name,
                    initiator = %initiator,
                    receivers = receivers,
                    "Remote event delivered locally"
                );
            }
            Err(RelayError::UnknownEventType { .. }) => {
                RelayCounters::bump(&self.counters.inbound_unknown_type);
                warn!(
                    event_name = %event_name,
                    initiator = %initiator,
                    "Dropping envelope with unknown event type"
                );
            }
            Err(e) => {
                RelayCounters::bump(&self.counters.inbound_decode_failed);
                warn!(
                    event_name = %event_name,
                    initiator = %initiator,
                    error = %e,
                    "Dropping undecodable envelope"
                );
            }
        }
        result
    }

    async fn deliver(&self, envelope: Envelope) -> Result<InboundOutcome, RelayError> {
        if !self.guard.admits_inbound(&envelope) {
            return Ok(InboundOutcome::Echo);
        }

        let descriptor = self.registry.resolve(&envelope.event_name)?;
        let event = descriptor.decode(envelope.event_body)?;
        let message = BusMessage::remote(event, Origin::new(envelope.event_initiator));
        let receivers = self.bus.publish(message).await;

        Ok(InboundOutcome::Delivered { receivers })
    }

    /// Drain the receive stream until it ends.
    pub async fn run<S>(self, mut envelopes: S)
    where
        S: Stream<Item = Envelope> + Unpin,
    {
        info!(identity = %self.guard.identity(), "Inbound relay started");
        while let Some(envelope) = envelopes.next().await {
            let _ = self.relay(envelope).await;
        }
        info!("Inbound relay stopped (receive stream ended)");
    }
}

/// Local to remote.
pub struct OutboundRelay<T: PubSubTransport> {
    channel: Arc<RemoteChannel<T>>,
    guard: LoopGuard,
    counters: Arc<RelayCounters>,
}

impl<T: PubSubTransport> OutboundRelay<T> {
    pub(crate) fn new(
        channel: Arc<RemoteChannel<T>>,
        guard: LoopGuard,
        counters: Arc<RelayCounters>,
    ) -> Self {
        Self {
            channel,
            guard,
            counters,
        }
    }

    /// Relay one local bus message to the remote topic.
    pub async fn relay(&self, message: &BusMessage) -> Result<OutboundOutcome, RelayError> {
        RelayCounters::bump(&self.counters.outbound_seen);

        let result = self.send(message).await;
        match &result {
            Ok(OutboundOutcome::RemoteOrigin) => {
                RelayCounters::bump(&self.counters.outbound_remote_skipped);
            }
            Ok(OutboundOutcome::Published { message_id }) => {
                RelayCounters::bump(&self.counters.outbound_published);
                debug!(
                    event_name = message.event_name(),
                    message_id = %message_id,
                    "Local event published remotely"
                );
            }
            Err(e) => {
                RelayCounters::bump(&self.counters.outbound_failed);
                warn!(
                    event_name = message.event_name(),
                    error = %e,
                    "Failed to publish local event"
                );
            }
        }
        result
    }

    async fn send(&self, message: &BusMessage) -> Result<OutboundOutcome, RelayError> {
        if !self.guard.admits_outbound(message) {
            return Ok(OutboundOutcome::RemoteOrigin);
        }

        let envelope = Envelope::from_event(message.event(), self.guard.identity())?;
        let message_id = self.channel.publish(&envelope).await?;

        Ok(OutboundOutcome::Published { message_id })
    }

    /// Relay every local bus message until the bus closes.
    pub async fn run(self, mut local_events: Subscription) {
        info!(identity = %self.guard.identity(), "Outbound relay started");
        while let Some(message) = local_events.recv().await {
            let _ = self.relay(&message).await;
        }
        info!("Outbound relay stopped (local bus closed)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryPubSub;
    use crate::config::{ConnectionConfig, ReceiveConfig};
    use crate::fixtures::{OrderPlaced, Unregistered};
    use serde_json::json;
    use shared_bus::{EventFilter, EventSubscriber};
    use shared_types::EventDescriptor;
    use tokio_test::{assert_err, assert_ok};

    const TOPIC: &str = "projects/proj/topics/events";

    fn registry() -> Arc<EventTypeRegistry> {
        let mut registry = EventTypeRegistry::new();
        registry.register(EventDescriptor::of::<OrderPlaced>());
        Arc::new(registry)
    }

    fn inbound(bus: &Arc<InMemoryEventBus>) -> InboundRelay {
        InboundRelay::new(
            registry(),
            bus.clone(),
            LoopGuard::new("svc-a"),
            Arc::new(RelayCounters::default()),
        )
    }

    async fn ready_channel(pubsub: &InMemoryPubSub) -> Arc<RemoteChannel<InMemoryPubSub>> {
        let channel = RemoteChannel::new(Arc::new(pubsub.clone()), ReceiveConfig::for_testing());
        channel
            .connect(&ConnectionConfig::new("proj", "events", "svc-a"))
            .await
            .unwrap();
        Arc::new(channel)
    }

    fn outbound(
        channel: Arc<RemoteChannel<InMemoryPubSub>>,
        counters: Arc<RelayCounters>,
    ) -> OutboundRelay<InMemoryPubSub> {
        OutboundRelay::new(channel, LoopGuard::new("svc-a"), counters)
    }

    fn order_envelope(initiator: &str) -> Envelope {
        Envelope {
            event_name: "OrderPlaced".to_string(),
            event_body: json!({ "orderId": "A1" }),
            event_initiator: initiator.to_string(),
        }
    }

    #[tokio::test]
    async fn test_inbound_own_envelope_publishes_nothing() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut local = bus.subscribe(EventFilter::all());
        let relay = inbound(&bus);

        let outcome = relay.relay(order_envelope("svc-a")).await.unwrap();

        assert_eq!(outcome, InboundOutcome::Echo);
        assert_eq!(bus.events_published(), 0);
        assert!(local.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inbound_foreign_envelope_publishes_typed_event_once() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut local = bus.subscribe(EventFilter::all());
        let relay = inbound(&bus);

        let outcome = relay.relay(order_envelope("svc-b")).await.unwrap();

        assert_eq!(outcome, InboundOutcome::Delivered { receivers: 1 });
        assert_eq!(bus.events_published(), 1);

        let message = local.try_recv().unwrap().expect("delivered");
        assert_eq!(message.downcast::<OrderPlaced>(), Some(&OrderPlaced::new("A1")));
        assert_eq!(message.origin().map(Origin::initiator), Some("svc-b"));
        assert!(local.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inbound_unknown_type_dropped() {
        let bus = Arc::new(InMemoryEventBus::new());
        let relay = inbound(&bus);
        let mut envelope = order_envelope("svc-b");
        envelope.event_name = "Mystery".to_string();

        let err = relay.relay(envelope).await.unwrap_err();

        assert!(matches!(err, RelayError::UnknownEventType { .. }));
        assert_eq!(bus.events_published(), 0);
        assert_eq!(relay.counters.snapshot().inbound_unknown_type, 1);
    }

    #[tokio::test]
    async fn test_inbound_bad_body_dropped() {
        let bus = Arc::new(InMemoryEventBus::new());
        let relay = inbound(&bus);
        let mut envelope = order_envelope("svc-b");
        envelope.event_body = json!({ "unexpected": true });

        let err = assert_err!(relay.relay(envelope).await);
        assert!(matches!(err, RelayError::Codec(_)));
        assert_eq!(bus.events_published(), 0);
        assert_eq!(relay.counters.snapshot().inbound_decode_failed, 1);
    }

    #[tokio::test]
    async fn test_outbound_local_event_produces_one_envelope() {
        let pubsub = InMemoryPubSub::with_topics([TOPIC]);
        let channel = ready_channel(&pubsub).await;
        let relay = outbound(channel, Arc::new(RelayCounters::default()));

        let outcome = relay
            .relay(&BusMessage::local(OrderPlaced::new("A1")))
            .await
            .unwrap();

        assert!(matches!(outcome, OutboundOutcome::Published { .. }));
        let published = pubsub.published_on(TOPIC);
        assert_eq!(published.len(), 1);
        assert_eq!(
            Envelope::from_bytes(&published[0]).unwrap(),
            order_envelope("svc-a")
        );
    }

    #[tokio::test]
    async fn test_outbound_remote_event_not_republished() {
        let pubsub = InMemoryPubSub::with_topics([TOPIC]);
        let channel = ready_channel(&pubsub).await;
        let relay = outbound(channel, Arc::new(RelayCounters::default()));

        let message = BusMessage::remote(Arc::new(OrderPlaced::new("A1")), Origin::new("svc-b"));
        let outcome = relay.relay(&message).await.unwrap();

        assert_eq!(outcome, OutboundOutcome::RemoteOrigin);
        assert!(pubsub.published_on(TOPIC).is_empty());
    }

    #[tokio::test]
    async fn test_outbound_publishes_types_without_handlers() {
        // Outbound does not consult the registry.
        let pubsub = InMemoryPubSub::with_topics([TOPIC]);
        let channel = ready_channel(&pubsub).await;
        let relay = outbound(channel, Arc::new(RelayCounters::default()));

        relay
            .relay(&BusMessage::local(Unregistered { value: 3 }))
            .await
            .unwrap();

        assert_eq!(pubsub.published_on(TOPIC).len(), 1);
    }

    #[tokio::test]
    async fn test_outbound_transport_failure_counted() {
        let pubsub = InMemoryPubSub::with_topics([TOPIC]);
        let channel = ready_channel(&pubsub).await;
        let counters = Arc::new(RelayCounters::default());
        let relay = outbound(channel, counters.clone());

        pubsub.fail_next_publish(crate::domain::TransportError::Unavailable("down".to_string()));
        let result = relay.relay(&BusMessage::local(OrderPlaced::new("A1"))).await;

        assert!(matches!(result, Err(RelayError::Channel(_))));
        assert_eq!(counters.snapshot().outbound_failed, 1);

        assert_ok!(relay.relay(&BusMessage::local(OrderPlaced::new("A2"))).await);
        assert_eq!(counters.snapshot().outbound_published, 1);
    }
}
