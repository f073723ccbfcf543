//! # Events
//!
//! The typed [`Event`] contract, its object-safe view [`DomainEvent`], and the
//! [`EventDescriptor`] factory used to rebuild events received from remote
//! services.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::EventCodecError;

/// An application event that can cross the process boundary.
///
/// `NAME` is the discriminator written to `eventName` on the wire. It must be
/// unique among the event types a process handles.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct OrderPlaced {
///     order_id: String,
/// }
///
/// impl Event for OrderPlaced {
///     const NAME: &'static str = "OrderPlaced";
/// }
/// ```
pub trait Event: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Wire discriminator for this event type.
    const NAME: &'static str;
}

/// Object-safe view of an event travelling on the local bus.
///
/// Implemented for every [`Event`]; there is no need to implement it by hand.
pub trait DomainEvent: fmt::Debug + Send + Sync + 'static {
    /// Wire discriminator of the concrete event.
    fn event_name(&self) -> &'static str;

    /// Serialize the payload into the JSON object carried as `eventBody`.
    fn to_body(&self) -> Result<Value, EventCodecError>;

    /// Access the concrete value for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<E: Event> DomainEvent for E {
    fn event_name(&self) -> &'static str {
        E::NAME
    }

    fn to_body(&self) -> Result<Value, EventCodecError> {
        let body = serde_json::to_value(self).map_err(|e| EventCodecError::Encode {
            event_name: E::NAME.to_string(),
            reason: e.to_string(),
        })?;

        if !body.is_object() {
            return Err(EventCodecError::NotAnObject {
                event_name: E::NAME.to_string(),
            });
        }

        Ok(body)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn DomainEvent {
    /// Borrow the concrete event if it is an `E`.
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    /// Whether the concrete event is an `E`.
    pub fn is<E: Event>(&self) -> bool {
        self.as_any().is::<E>()
    }
}

/// Factory that rebuilds a typed event from its JSON body.
pub type DecodeFn = fn(Value) -> Result<Arc<dyn DomainEvent>, serde_json::Error>;

/// Everything needed to reconstruct one event type from the wire.
#[derive(Clone, Copy)]
pub struct EventDescriptor {
    name: &'static str,
    type_name: &'static str,
    decode: DecodeFn,
}

impl EventDescriptor {
    /// Describe the event type `E`.
    #[must_use]
    pub fn of<E: Event>() -> Self {
        Self {
            name: E::NAME,
            type_name: type_name::<E>(),
            decode: decode_as::<E>,
        }
    }

    /// Wire discriminator.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fully qualified Rust type the descriptor decodes into.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether two descriptors decode into the same Rust type.
    #[must_use]
    pub fn same_type(&self, other: &EventDescriptor) -> bool {
        self.type_name == other.type_name
    }

    /// Rebuild the typed event from an envelope body.
    pub fn decode(&self, body: Value) -> Result<Arc<dyn DomainEvent>, EventCodecError> {
        (self.decode)(body).map_err(|e| EventCodecError::Decode {
            event_name: self.name.to_string(),
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish()
    }
}

fn decode_as<E: Event>(body: Value) -> Result<Arc<dyn DomainEvent>, serde_json::Error> {
    let event: E = serde_json::from_value(body)?;
    Ok(Arc::new(event))
}
