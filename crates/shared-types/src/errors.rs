//! # Error Types
//!
//! Encoding and decoding failures for events and envelopes.

use thiserror::Error;

/// Errors raised while moving an event between its typed and wire forms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventCodecError {
    /// The event could not be serialized.
    #[error("Failed to encode {event_name}: {reason}")]
    Encode { event_name: String, reason: String },

    /// The event serialized to something other than a JSON object.
    #[error("Event {event_name} must serialize to a JSON object")]
    NotAnObject { event_name: String },

    /// The body did not match the shape of the registered event type.
    #[error("Failed to decode {event_name}: {reason}")]
    Decode { event_name: String, reason: String },

    /// The wire payload is not a valid envelope.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
}
