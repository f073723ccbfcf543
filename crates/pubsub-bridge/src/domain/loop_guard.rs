//! # Loop Guard
//!
//! The two filters that keep an event from bouncing across the bridge.
//!
//! - Outbound: anything carrying an [`Origin`](shared_types::Origin) came in
//!   through the bridge and is not sent back out.
//! - Inbound: an envelope whose initiator is our own identity was already
//!   handled locally before it was published, so it is not delivered again.
//!
//! The initiator is stamped exactly once, on the way out.

use shared_bus::BusMessage;
use shared_types::Envelope;

/// Identity-aware echo filter for one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopGuard {
    identity: String,
}

impl LoopGuard {
    /// Guard for the bridge whose subscription name is `identity`.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }

    /// This bridge's initiator identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Whether a received envelope should be delivered locally.
    #[must_use]
    pub fn admits_inbound(&self, envelope: &Envelope) -> bool {
        !envelope.is_from(&self.identity)
    }

    /// Whether a local bus message should be published remotely.
    #[must_use]
    pub fn admits_outbound(&self, message: &BusMessage) -> bool {
        !message.is_remote()
    }
}
