//! # Pub/Sub Bridge
//!
//! Connects a service's [`InMemoryEventBus`](shared_bus::InMemoryEventBus) to
//! a shared remote Pub/Sub topic so that every instance subscribed to the
//! topic sees every event, and no instance handles its own event twice.
//!
//! ## Wire Envelope
//!
//! ```json
//! { "eventName": "OrderPlaced", "eventBody": { "orderId": "A1" }, "eventInitiator": "svc-a" }
//! ```
//!
//! `eventInitiator` is the publishing instance's subscription name.
//!
//! ## Relays
//!
//! | Direction | Filter | Effect |
//! |-----------|--------|--------|
//! | Inbound | `eventInitiator == identity` is dropped | Decode via registry, publish locally with an `Origin` |
//! | Outbound | messages carrying an `Origin` are dropped | Wrap in an envelope, publish to the topic |
//!
//! An event is tagged with its initiator exactly once (outbound), and that tag
//! is the only signal either direction uses to stop echoes.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/rest.rs      - Pub/Sub REST transport                 │
//! │  adapters/in_memory.rs - in-process transport for tests/dev     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - BridgeApi trait                            │
//! │  ports/outbound.rs - PubSubTransport trait                      │
//! │  application/      - RemoteChannel, relays, EventBridge         │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/registry.rs   - EventTypeRegistry                       │
//! │  domain/loop_guard.rs - LoopGuard                               │
//! │  domain/state.rs      - ChannelState                            │
//! │  domain/errors.rs     - ChannelError, RelayError, BridgeError   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let bus = Arc::new(InMemoryEventBus::new());
//! let bridge = EventBridge::new(bus.clone(), Arc::new(RestPubSub::new(&config)?));
//!
//! bridge.initialize(config).await?;
//! bus.register_handler("orders", Arc::new(OrderHandler));
//! let handle = bridge.start().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::{InMemoryPubSub, RestPubSub};
pub use application::{
    BridgeHandle, BridgeStats, EventBridge, InboundOutcome, OutboundOutcome, RemoteChannel,
};
pub use config::{ConnectionConfig, ReceiveConfig};
pub use domain::{
    BridgeError, ChannelError, ChannelState, EventTypeRegistry, LoopGuard, RelayError,
    TransportError,
};
pub use ports::{BridgeApi, PubSubTransport, ReceivedMessage, SubscriptionInfo};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
