//! # Channel State
//!
//! Lifecycle of the remote channel.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──resolved──▶ Ready
//!       ▲                        │
//!       │                        └──setup error──▶ Failed ──connect──▶ Connecting
//!       └──────────── disconnect ◀──── Ready
//! ```

use std::fmt;

/// State of a remote channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Created, or torn down.
    #[default]
    Disconnected,
    /// Resolving topic and subscription.
    Connecting,
    /// Topic and subscription resolved; receive stream running.
    Ready,
    /// Setup failed. Stays here until the owner calls `connect` again.
    Failed,
}

impl ChannelState {
    /// Publishing and receiving are allowed.
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == ChannelState::Ready
    }

    /// A `connect` call may start from this state.
    #[must_use]
    pub fn can_connect(self) -> bool {
        matches!(self, ChannelState::Disconnected | ChannelState::Failed)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Disconnected => "Disconnected",
            ChannelState::Connecting => "Connecting",
            ChannelState::Ready => "Ready",
            ChannelState::Failed => "Failed",
        };
        f.write_str(name)
    }
}
