//! # Inbound Ports
//!
//! Lifecycle API the host process drives.

use async_trait::async_trait;

use crate::application::{BridgeHandle, BridgeStats};
use crate::config::ConnectionConfig;
use crate::domain::{BridgeError, ChannelState};

/// Event bridge API - inbound port.
///
/// `initialize` and `start` are separate hooks: the registry can only be
/// built once the host has finished registering its handlers.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    /// Connect the remote channel. Startup errors propagate.
    async fn initialize(&self, config: ConnectionConfig) -> Result<(), BridgeError>;

    /// Build the registry and start both relay loops.
    async fn start(&self) -> Result<BridgeHandle, BridgeError>;

    /// Current remote channel state. `Ready` means the service may report ready.
    fn channel_state(&self) -> ChannelState;

    /// Initiator identity, known after `initialize`.
    fn identity(&self) -> Option<String>;

    /// Relay counters.
    fn stats(&self) -> BridgeStats;
}
