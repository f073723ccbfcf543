//! # Channel Setup
//!
//! Connect sequence, readiness and transport faults as seen through the
//! bridge API.

use pubsub_bridge::{
    BridgeApi, BridgeError, ChannelError, ChannelState, InMemoryPubSub, PubSubTransport,
    TransportError,
};
use shared_types::Envelope;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use super::fixtures::*;

const SUBSCRIPTION: &str = "projects/proj/subscriptions/svc-a";

#[tokio::test]
async fn test_missing_topic_fails_initialize() {
    let pubsub = InMemoryPubSub::with_topics(["projects/proj/topics/payments"]);
    let instance = Instance::new(&pubsub);

    let err = assert_err!(instance.bridge.initialize(config("svc-a")).await);

    assert!(matches!(
        err,
        BridgeError::Channel(ChannelError::TopicNotFound { ref topic }) if topic == TOPIC_NAME
    ));
    assert_eq!(instance.bridge.channel_state(), ChannelState::Failed);
    assert!(pubsub.subscription_names().is_empty());
}

#[tokio::test]
async fn test_invalid_config_fails_before_transport() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let instance = Instance::new(&pubsub);

    let err = assert_err!(instance.bridge.initialize(config("")).await);

    assert!(matches!(
        err,
        BridgeError::Channel(ChannelError::ConfigInvalid(_))
    ));
    assert_eq!(pubsub.subscription_creations(), 0);
}

#[tokio::test]
async fn test_initialize_creates_subscription_once() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);

    let first = Instance::connected(&pubsub, "svc-a").await;
    first.bridge.channel().disconnect();
    assert_ok!(first.bridge.initialize(config("svc-a")).await);

    assert_eq!(pubsub.subscription_names(), vec![SUBSCRIPTION.to_string()]);
    assert_eq!(pubsub.subscription_creations(), 1);
    assert_eq!(first.bridge.channel_state(), ChannelState::Ready);
}

#[tokio::test]
async fn test_initialize_twice_is_rejected() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let instance = Instance::connected(&pubsub, "svc-a").await;

    let err = assert_err!(instance.bridge.initialize(config("svc-a")).await);

    assert!(matches!(
        err,
        BridgeError::Channel(ChannelError::AlreadyConnected {
            state: ChannelState::Ready
        })
    ));
}

#[tokio::test]
async fn test_concurrent_connect_race_yields_one_subscription() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    // Listings lag behind creation, so every racer tries to create.
    pubsub.set_stale_listings(true);

    let racers: Vec<_> = (0..4).map(|_| Arc::new(Instance::new(&pubsub))).collect();
    let tasks: Vec<_> = racers
        .iter()
        .cloned()
        .map(|instance| {
            tokio::spawn(async move { instance.bridge.initialize(config("svc-a")).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        assert_ok!(result.unwrap());
    }

    assert_eq!(pubsub.subscription_creations(), 1);
    for instance in &racers {
        assert_eq!(instance.bridge.channel_state(), ChannelState::Ready);
        let binding = instance.bridge.channel().binding().unwrap();
        assert_eq!(binding.subscription, SUBSCRIPTION);
        assert_eq!(binding.topic, TOPIC);
    }
}

#[tokio::test]
async fn test_ready_is_observable_through_watch() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let instance = Instance::new(&pubsub);
    let mut state = instance.bridge.channel().watch_state();

    assert_ok!(instance.bridge.initialize(config("svc-a")).await);

    tokio::time::timeout(WAIT, state.wait_for(|s| s.is_ready()))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_outbound_transport_failure_is_contained() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let a = Instance::connected(&pubsub, "svc-a").await;
    let mut errors = a.bridge.channel().errors();
    let relays = a.start().await;

    pubsub.fail_next_publish(TransportError::Unavailable("quota".to_string()));
    a.bus.raise(OrderPlaced::new("lost")).await;
    eventually(|| a.bridge.stats().outbound_failed == 1).await;

    let reported = tokio::time::timeout(WAIT, errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(reported, TransportError::Unavailable(_)));

    // The relay keeps going
    a.bus.raise(OrderPlaced::new("kept")).await;
    eventually(|| pubsub.published_on(TOPIC).len() == 1).await;
    let envelope = Envelope::from_bytes(&pubsub.published_on(TOPIC)[0]).unwrap();
    assert_eq!(envelope.event_body["orderId"], "kept");
    assert!(relays.is_running());

    relays.shutdown().await;
}

#[tokio::test]
async fn test_outage_reported_and_pump_recovers() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let a = Instance::connected(&pubsub, "svc-a").await;
    let b = Instance::connected(&pubsub, "svc-b").await;
    let (recorder, mut seen) = Recorder::<OrderPlaced>::new();
    b.bus.register_handler("orders", recorder);
    let mut b_errors = b.bridge.channel().errors();
    let a_relays = a.start().await;
    let b_relays = b.start().await;

    pubsub.set_unavailable(true);
    let reported = tokio::time::timeout(WAIT, b_errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(reported, TransportError::Unavailable(_)));
    assert_eq!(b.bridge.channel_state(), ChannelState::Ready);
    pubsub.set_unavailable(false);

    a.bus.raise(OrderPlaced::new("after-outage")).await;
    let (event, origin) = tokio::time::timeout(WAIT, seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, OrderPlaced::new("after-outage"));
    assert_eq!(origin.as_deref(), Some("svc-a"));

    a_relays.shutdown().await;
    b_relays.shutdown().await;
}

#[tokio::test]
async fn test_start_requires_initialize() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let instance = Instance::new(&pubsub);

    let err = assert_err!(instance.bridge.start().await);
    assert!(matches!(err, BridgeError::NotInitialized));
}

#[tokio::test]
async fn test_subscription_on_other_topic_not_reused() {
    const AUDIT: &str = "projects/proj/topics/audit";
    const AUDIT_SUBSCRIPTION: &str = "projects/proj/subscriptions/svc-a-audit";

    let pubsub = InMemoryPubSub::with_topics([TOPIC, AUDIT]);
    assert_ok!(pubsub.create_subscription(AUDIT_SUBSCRIPTION, AUDIT).await);

    let instance = Instance::connected(&pubsub, "svc-a").await;
    let binding = instance.bridge.channel().binding().expect("ready binding");
    assert_eq!(binding.topic, TOPIC);
    assert_eq!(binding.subscription, SUBSCRIPTION);
    assert_eq!(pubsub.subscription_creations(), 2);

    let (recorder, mut seen) = Recorder::<OrderPlaced>::new();
    instance.bus.register_handler("orders", recorder);
    let relays = instance.start().await;

    let audit_event = Envelope {
        event_name: "OrderPlaced".to_string(),
        event_body: serde_json::json!({ "orderId": "audit-1" }),
        event_initiator: "svc-b".to_string(),
    };
    assert_ok!(pubsub.publish(AUDIT, audit_event.to_bytes().unwrap()).await);

    settle().await;
    assert!(seen.try_recv().is_err());
    assert_eq!(instance.bridge.stats().inbound_received, 0);
    assert_eq!(pubsub.pending(AUDIT_SUBSCRIPTION), 1);

    relays.shutdown().await;
}

#[tokio::test]
async fn test_same_subscription_name_on_other_topic_fails() {
    const AUDIT: &str = "projects/proj/topics/audit";

    let pubsub = InMemoryPubSub::with_topics([TOPIC, AUDIT]);
    assert_ok!(pubsub.create_subscription(SUBSCRIPTION, AUDIT).await);
    let instance = Instance::new(&pubsub);

    let err = assert_err!(instance.bridge.initialize(config("svc-a")).await);
    assert!(matches!(
        err,
        BridgeError::Channel(ChannelError::SubscriptionOnOtherTopic { ref topic, .. }) if topic == TOPIC
    ));
    assert_eq!(instance.bridge.channel_state(), ChannelState::Failed);
}

#[tokio::test]
async fn test_shutdown_then_restart_resumes_relaying() {
    let pubsub = InMemoryPubSub::with_topics([TOPIC]);
    let a = Instance::connected(&pubsub, "svc-a").await;
    let b = Instance::connected(&pubsub, "svc-b").await;
    let (recorder, mut seen) = Recorder::<OrderPlaced>::new();
    b.bus.register_handler("orders", recorder);
    let a_relays = a.start().await;

    b.start().await.shutdown().await;
    assert_eq!(b.bridge.channel_state(), ChannelState::Disconnected);

    // Published while svc-b is down; waits on its subscription.
    a.bus.raise(OrderPlaced::new("while-down")).await;
    eventually(|| pubsub.published_on(TOPIC).len() == 1).await;

    assert_ok!(b.bridge.initialize(config("svc-b")).await);
    let b_relays = b.start().await;

    let (event, _) = tokio::time::timeout(WAIT, seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event, OrderPlaced::new("while-down"));

    a_relays.shutdown().await;
    b_relays.shutdown().await;
}
