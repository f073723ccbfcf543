//! # Envelope
//!
//! Wire representation exchanged over the remote topic, and the in-memory
//! [`Origin`] marker attached to events that arrived through it.
//!
//! ```text
//! {
//!   "eventName": "OrderPlaced",
//!   "eventBody": { "orderId": "A1" },
//!   "eventInitiator": "svc-a"
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EventCodecError;
use crate::event::DomainEvent;

/// Wire wrapper around one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Discriminator of the wrapped event.
    pub event_name: String,
    /// Serialized payload. Always a JSON object.
    pub event_body: Value,
    /// Identity of the bridge instance that published the envelope.
    pub event_initiator: String,
}

impl Envelope {
    /// Wrap an event published by `initiator`.
    pub fn from_event(event: &dyn DomainEvent, initiator: &str) -> Result<Self, EventCodecError> {
        if initiator.is_empty() {
            return Err(EventCodecError::MalformedEnvelope(
                "eventInitiator must not be empty".to_string(),
            ));
        }

        Ok(Self {
            event_name: event.event_name().to_string(),
            event_body: event.to_body()?,
            event_initiator: initiator.to_string(),
        })
    }

    /// Encode as JSON bytes for the transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EventCodecError> {
        serde_json::to_vec(self).map_err(|e| EventCodecError::Encode {
            event_name: self.event_name.clone(),
            reason: e.to_string(),
        })
    }

    /// Parse and validate a transport payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self, EventCodecError> {
        let envelope: Envelope = serde_json::from_slice(data)
            .map_err(|e| EventCodecError::MalformedEnvelope(e.to_string()))?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Check the envelope invariants.
    pub fn validate(&self) -> Result<(), EventCodecError> {
        if self.event_name.is_empty() {
            return Err(EventCodecError::MalformedEnvelope(
                "eventName must not be empty".to_string(),
            ));
        }
        if self.event_initiator.is_empty() {
            return Err(EventCodecError::MalformedEnvelope(
                "eventInitiator must not be empty".to_string(),
            ));
        }
        if !self.event_body.is_object() {
            return Err(EventCodecError::MalformedEnvelope(format!(
                "eventBody of {} must be an object",
                self.event_name
            )));
        }
        Ok(())
    }

    /// Whether this envelope was published by `identity`.
    #[must_use]
    pub fn is_from(&self, identity: &str) -> bool {
        self.event_initiator == identity
    }
}

/// Marks an event that entered the process from the remote topic.
///
/// Lives only beside the event on the local bus. It has no serialized form,
/// so it cannot leak into an outgoing envelope body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    initiator: String,
}

impl Origin {
    /// Record the remote publisher.
    #[must_use]
    pub fn new(initiator: impl Into<String>) -> Self {
        Self {
            initiator: initiator.into(),
        }
    }

    /// Identity of the bridge instance that published the event.
    #[must_use]
    pub fn initiator(&self) -> &str {
        &self.initiator
    }
}
