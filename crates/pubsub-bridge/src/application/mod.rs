//! # Application Layer
//!
//! Remote channel, relay loops and the bridge service.

pub mod channel;
pub mod relay;
pub mod service;
pub mod stats;

pub use channel::{Binding, EnvelopeStream, RemoteChannel, ERROR_OBSERVER_CAPACITY};
pub use relay::{InboundOutcome, InboundRelay, OutboundOutcome, OutboundRelay};
pub use service::{BridgeHandle, EventBridge};
pub use stats::BridgeStats;
