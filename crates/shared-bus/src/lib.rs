//! # Shared Bus - In-Process Event Bus
//!
//! The local publish/subscribe point a service uses to raise and handle its
//! domain events. The Pub/Sub bridge is one more producer and consumer here.
//!
//! ## Message Flow
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Controller   │                    │ EventHandler │
//! │              │    raise()         │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//!                     ↑       │
//!          remote(..) │       │ all local events
//!                  ┌──────────────┐
//!                  │ Pub/Sub      │
//!                  │ bridge       │
//!                  └──────────────┘
//! ```
//!
//! ## Origin
//!
//! Events rebuilt from the remote topic are published as
//! [`BusMessage::remote`] and carry an [`Origin`](shared_types::Origin).
//! Handlers see the marker as an argument; the event value never contains it.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod handler;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{BusMessage, EventFilter, OriginFilter};
pub use handler::{EventHandler, HandlerDeclaration, HandlerError};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
