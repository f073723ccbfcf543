//! # Relay Flows
//!
//! Events crossing between instances that share one topic.
//!
//! ```text
//! svc-a bus ──outbound──▶ topic ──▶ sub svc-a ──inbound──▶ (echo, dropped)
//!                               └──▶ sub svc-b ──inbound──▶ svc-b bus
//! ```

use pubsub_bridge::{BridgeApi, InMemoryPubSub, PubSubTransport};
use shared_bus::EventPublisher;
use shared_types::{Envelope, Event};
use std::sync::Arc;

use super::fixtures::*;

fn envelopes_on_topic(pubsub: &InMemoryPubSub) -> Vec<Envelope> {
    pubsub
        .published_on(TOPIC)
        .iter()
        .map(|data| Envelope::from_bytes(data).expect("valid envelope"))
        .collect()
}

#[tokio::test]
async fn test_order_placed_reaches_other_instance_once() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let a = Instance::connected(&pubsub, "svc-a").await;
    let b = Instance::connected(&pubsub, "svc-b").await;

    let (a_orders, mut a_seen) = Recorder::<OrderPlaced>::new();
    let (b_orders, mut b_seen) = Recorder::<OrderPlaced>::new();
    a.bus.register_handler("orders", a_orders);
    b.bus.register_handler("orders", b_orders);
    let a_relays = a.start().await;
    let b_relays = b.start().await;

    a.bus.raise(OrderPlaced::new("A1")).await;

    // Wire shape
    eventually(|| pubsub.published_on(TOPIC).len() == 1).await;
    let envelope = &envelopes_on_topic(&pubsub)[0];
    assert_eq!(envelope.event_name, "OrderPlaced");
    assert_eq!(envelope.event_body, serde_json::json!({ "orderId": "A1" }));
    assert_eq!(envelope.event_initiator, "svc-a");

    // svc-b gets a typed event tagged with its origin
    let (event, origin) = tokio::time::timeout(WAIT, b_seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, OrderPlaced::new("A1"));
    assert_eq!(origin.as_deref(), Some("svc-a"));

    // svc-a handled it locally, once, and dropped its own echo
    let (event, origin) = a_seen.recv().await.unwrap();
    assert_eq!(event, OrderPlaced::new("A1"));
    assert!(origin.is_none());
    eventually(|| a.bridge.stats().inbound_echo_skipped == 1).await;

    // svc-b did not send it back
    eventually(|| b.bridge.stats().outbound_remote_skipped == 1).await;
    settle().await;
    assert!(a_seen.try_recv().is_err());
    assert!(b_seen.try_recv().is_err());
    assert_eq!(pubsub.published_on(TOPIC).len(), 1);

    a_relays.shutdown().await;
    b_relays.shutdown().await;
}

#[tokio::test]
async fn test_three_instances_each_see_every_event_once() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let mut instances = Vec::new();
    let mut deliveries = Vec::new();
    for identity in ["svc-a", "svc-b", "svc-c"] {
        let instance = Instance::connected(&pubsub, identity).await;
        let (recorder, seen) = Recorder::<OrderPlaced>::new();
        instance.bus.register_handler("orders", recorder);
        deliveries.push(seen);
        instances.push(instance);
    }
    let mut handles = Vec::new();
    for instance in &instances {
        handles.push(instance.start().await);
    }

    for (i, instance) in instances.iter().enumerate() {
        instance.bus.raise(OrderPlaced::new(&format!("order-{i}"))).await;
    }

    for seen in &mut deliveries {
        let mut ids = Vec::new();
        for _ in 0..3 {
            let (event, _) = tokio::time::timeout(WAIT, seen.recv())
                .await
                .unwrap()
                .unwrap();
            ids.push(event.order_id);
        }
        ids.sort();
        assert_eq!(ids, vec!["order-0", "order-1", "order-2"]);
    }

    settle().await;
    assert_eq!(pubsub.published_on(TOPIC).len(), 3);
    for seen in &mut deliveries {
        assert!(seen.try_recv().is_err());
    }
    for instance in &instances {
        let stats = instance.bridge.stats();
        assert_eq!(stats.inbound_delivered, 2);
        assert_eq!(stats.inbound_echo_skipped, 1);
        assert_eq!(stats.outbound_published, 1);
    }

    for handle in handles {
        handle.shutdown().await;
    }
}

#[tokio::test]
async fn test_unhandled_type_is_dropped_by_receiver() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let a = Instance::connected(&pubsub, "svc-a").await;
    let b = Instance::connected(&pubsub, "svc-b").await;
    let (b_orders, mut b_seen) = Recorder::<OrderPlaced>::new();
    b.bus.register_handler("orders", b_orders);
    let a_relays = a.start().await;
    let b_relays = b.start().await;

    // svc-a has no handler for OrderShipped, but still publishes it
    a.bus
        .raise(OrderShipped {
            order_id: "A1".to_string(),
            carrier: "post".to_string(),
        })
        .await;

    eventually(|| b.bridge.stats().inbound_unknown_type == 1).await;
    assert_eq!(b.bus.events_published(), 0);
    assert!(b_seen.try_recv().is_err());
    assert_eq!(envelopes_on_topic(&pubsub)[0].event_name, OrderShipped::NAME);

    a_relays.shutdown().await;
    b_relays.shutdown().await;
}

#[tokio::test]
async fn test_failing_handler_does_not_stop_relay() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let a = Instance::connected(&pubsub, "svc-a").await;
    let b = Instance::connected(&pubsub, "svc-b").await;
    let (recorder, mut seen) = Recorder::<OrderPlaced>::new();
    b.bus.register_handler("failing", Arc::new(Failing));
    b.bus.register_handler("orders", recorder);
    let a_relays = a.start().await;
    let b_relays = b.start().await;

    a.bus.raise(OrderPlaced::new("A1")).await;
    a.bus.raise(OrderPlaced::new("A2")).await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let (event, _) = tokio::time::timeout(WAIT, seen.recv())
            .await
            .unwrap()
            .unwrap();
        ids.push(event.order_id);
    }
    ids.sort();
    assert_eq!(ids, vec!["A1", "A2"]);

    a_relays.shutdown().await;
    b_relays.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_delivery_is_not_deduplicated() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let b = Instance::connected(&pubsub, "svc-b").await;
    let (recorder, mut seen) = Recorder::<OrderPlaced>::new();
    b.bus.register_handler("orders", recorder);
    let b_relays = b.start().await;

    let envelope = Envelope {
        event_name: "OrderPlaced".to_string(),
        event_body: serde_json::json!({ "orderId": "A1" }),
        event_initiator: "svc-a".to_string(),
    };
    let data = envelope.to_bytes().unwrap();
    pubsub.publish(TOPIC, data.clone()).await.unwrap();
    pubsub.publish(TOPIC, data).await.unwrap();

    for _ in 0..2 {
        let (event, origin) = tokio::time::timeout(WAIT, seen.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, OrderPlaced::new("A1"));
        assert_eq!(origin.as_deref(), Some("svc-a"));
    }

    b_relays.shutdown().await;
}

#[tokio::test]
async fn test_malformed_payload_skipped_and_later_messages_flow() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let b = Instance::connected(&pubsub, "svc-b").await;
    let (recorder, mut seen) = Recorder::<OrderPlaced>::new();
    b.bus.register_handler("orders", recorder);
    let b_relays = b.start().await;

    pubsub.publish(TOPIC, b"not json".to_vec()).await.unwrap();
    let envelope = Envelope {
        event_name: "OrderPlaced".to_string(),
        event_body: serde_json::json!({ "orderId": "A2" }),
        event_initiator: "svc-a".to_string(),
    };
    pubsub
        .publish(TOPIC, envelope.to_bytes().unwrap())
        .await
        .unwrap();

    let (event, _) = tokio::time::timeout(WAIT, seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, OrderPlaced::new("A2"));
    eventually(|| pubsub.outstanding("projects/proj/subscriptions/svc-b") == 0).await;

    b_relays.shutdown().await;
}

#[tokio::test]
async fn test_replicas_sharing_identity_never_handle_own_events_twice() {
    // Two replicas of svc-a compete on one subscription.
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let first = Instance::connected(&pubsub, "svc-a").await;
    let second = Instance::connected(&pubsub, "svc-a").await;
    let (recorder, mut seen) = Recorder::<OrderPlaced>::new();
    second.bus.register_handler("orders", recorder);
    let first_relays = first.start().await;
    let second_relays = second.start().await;

    first.bus.raise(OrderPlaced::new("A1")).await;

    eventually(|| {
        first.bridge.stats().inbound_echo_skipped + second.bridge.stats().inbound_echo_skipped
            == 1
    })
    .await;
    settle().await;
    assert!(seen.try_recv().is_err());
    assert_eq!(pubsub.subscription_creations(), 1);

    first_relays.shutdown().await;
    second_relays.shutdown().await;
}

#[tokio::test]
async fn test_burst_larger_than_bus_capacity_all_published() {
    const BURST: usize = 1500;

    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let a = Instance::connected(&pubsub, "svc-a").await;
    let b = Instance::connected(&pubsub, "svc-b").await;
    assert!(BURST > a.bus.capacity());

    let (recorder, mut seen) = Recorder::<OrderPlaced>::new();
    b.bus.register_handler("orders", recorder);
    let a_relays = a.start().await;
    let b_relays = b.start().await;

    for i in 0..BURST {
        a.bus.raise(OrderPlaced::new(&format!("A{i}"))).await;
    }

    tokio::time::timeout(WAIT * 5, async {
        while a.bridge.stats().outbound_published < BURST as u64 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("every local event should be published");

    let stats = a.bridge.stats();
    assert_eq!(stats.outbound_seen, BURST as u64);
    assert_eq!(stats.outbound_failed, 0);
    assert_eq!(pubsub.published_on(TOPIC).len(), BURST);

    for i in 0..BURST {
        let (event, origin) = tokio::time::timeout(WAIT, seen.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, OrderPlaced::new(&format!("A{i}")));
        assert_eq!(origin.as_deref(), Some("svc-a"));
    }

    a_relays.shutdown().await;
    b_relays.shutdown().await;
}
