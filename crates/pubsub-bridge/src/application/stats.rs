//! # Relay Statistics
//!
//! Per-message outcomes are only visible through logs and these counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Envelopes taken from the receive stream.
    pub inbound_received: u64,
    /// Envelopes republished on the local bus.
    pub inbound_delivered: u64,
    /// Envelopes dropped because this instance published them.
    pub inbound_echo_skipped: u64,
    /// Envelopes dropped because no handler declared their type.
    pub inbound_unknown_type: u64,
    /// Envelopes dropped because the body did not decode.
    pub inbound_decode_failed: u64,
    /// Local bus messages seen by the outbound relay.
    pub outbound_seen: u64,
    /// Envelopes handed to the transport.
    pub outbound_published: u64,
    /// Messages not sent because they came from the remote side.
    pub outbound_remote_skipped: u64,
    /// Messages that failed to encode or publish.
    pub outbound_failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct RelayCounters {
    pub(crate) inbound_received: AtomicU64,
    pub(crate) inbound_delivered: AtomicU64,
    pub(crate) inbound_echo_skipped: AtomicU64,
    pub(crate) inbound_unknown_type: AtomicU64,
    pub(crate) inbound_decode_failed: AtomicU64,
    pub(crate) outbound_seen: AtomicU64,
    pub(crate) outbound_published: AtomicU64,
    pub(crate) outbound_remote_skipped: AtomicU64,
    pub(crate) outbound_failed: AtomicU64,
}

impl RelayCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BridgeStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        BridgeStats {
            inbound_received: load(&self.inbound_received),
            inbound_delivered: load(&self.inbound_delivered),
            inbound_echo_skipped: load(&self.inbound_echo_skipped),
            inbound_unknown_type: load(&self.inbound_unknown_type),
            inbound_decode_failed: load(&self.inbound_decode_failed),
            outbound_seen: load(&self.outbound_seen),
            outbound_published: load(&self.outbound_published),
            outbound_remote_skipped: load(&self.outbound_remote_skipped),
            outbound_failed: load(&self.outbound_failed),
        }
    }
}
