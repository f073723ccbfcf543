//! # Domain Errors
//!
//! Error types for the Pub/Sub bridge.
//!
//! Startup errors ([`ChannelError`], [`BridgeError`]) propagate to the host.
//! Per-message errors ([`RelayError`]) stay inside the relay loops.

use shared_types::EventCodecError;
use thiserror::Error;

use super::state::ChannelState;

/// Failures reported by the Pub/Sub transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Network failure, quota exhaustion or server-side outage.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// Credentials missing or rejected.
    #[error("Transport authentication failed: {0}")]
    Unauthenticated(String),

    /// The addressed topic or subscription does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Another consumer created the resource first.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// The request was refused for any other reason.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The transport answered with something we could not read.
    #[error("Invalid transport response: {0}")]
    InvalidResponse(String),
}

/// Errors from the remote channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Connection configuration is malformed.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// No existing topic matches the configured name. Topics are never auto-created.
    #[error("Topic not found: {topic}")]
    TopicNotFound {
        /// Configured topic name
        topic: String,
    },

    /// The configured subscription exists but reads from another topic.
    #[error("Subscription {subscription} is bound to {bound_topic}, not {topic}")]
    SubscriptionOnOtherTopic {
        /// Full subscription name
        subscription: String,
        /// Topic the subscription reads from
        bound_topic: String,
        /// Topic this channel was configured for
        topic: String,
    },

    /// Operation requires a `Ready` channel.
    #[error("Channel not ready (state: {state})")]
    ChannelNotReady {
        /// State at the time of the call
        state: ChannelState,
    },

    /// `connect` was called while connecting or connected.
    #[error("Channel already connected or connecting (state: {state})")]
    AlreadyConnected {
        /// State at the time of the call
        state: ChannelState,
    },

    /// The inbound stream was already handed out for this connection.
    #[error("Receive stream already taken")]
    ReceiveStreamTaken,

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Envelope could not be encoded.
    #[error(transparent)]
    Codec(#[from] EventCodecError),
}

/// Per-message failures inside the relay loops.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Inbound envelope names a type no local handler declared.
    #[error("Unknown event type: {event_name}")]
    UnknownEventType {
        /// Name carried by the envelope
        event_name: String,
    },

    /// Body did not decode, or event did not encode.
    #[error(transparent)]
    Codec(#[from] EventCodecError),

    /// Publishing to the remote channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Lifecycle errors surfaced to the host process.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Connecting the remote channel failed.
    #[error("Remote channel error: {0}")]
    Channel(#[from] ChannelError),

    /// `start` was called before a successful `initialize`.
    #[error("Bridge not initialized")]
    NotInitialized,

    /// `start` was called twice.
    #[error("Bridge already started")]
    AlreadyStarted,
}
