//! # Bus Messages
//!
//! What flows through the local bus: an event plus, for events that came in
//! from the remote topic, the [`Origin`] marker.

use std::sync::Arc;

use shared_types::{DomainEvent, Event, Origin};

/// One event on the local bus.
///
/// The origin marker is carried beside the event, never inside it.
#[derive(Debug, Clone)]
pub struct BusMessage {
    event: Arc<dyn DomainEvent>,
    origin: Option<Origin>,
}

impl BusMessage {
    /// An event raised inside this process.
    pub fn local<E: Event>(event: E) -> Self {
        Self {
            event: Arc::new(event),
            origin: None,
        }
    }

    /// An already shared event raised inside this process.
    #[must_use]
    pub fn from_shared(event: Arc<dyn DomainEvent>) -> Self {
        Self {
            event,
            origin: None,
        }
    }

    /// An event reconstructed from a remote envelope.
    #[must_use]
    pub fn remote(event: Arc<dyn DomainEvent>, origin: Origin) -> Self {
        Self {
            event,
            origin: Some(origin),
        }
    }

    /// The event itself.
    #[must_use]
    pub fn event(&self) -> &dyn DomainEvent {
        self.event.as_ref()
    }

    /// Wire discriminator of the event.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        self.event.event_name()
    }

    /// Remote publisher, if the event came from the remote topic.
    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Whether the event came from the remote topic.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.origin.is_some()
    }

    /// Borrow the concrete event if it is an `E`.
    #[must_use]
    pub fn downcast<E: Event>(&self) -> Option<&E> {
        self.event.as_ref().downcast_ref::<E>()
    }
}

/// Which origins a filter lets through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OriginFilter {
    /// Local and remote events.
    #[default]
    Any,
    /// Only events raised in this process.
    LocalOnly,
    /// Only events reconstructed from the remote topic.
    RemoteOnly,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Event names to include. Empty means all events.
    pub event_names: Vec<String>,
    /// Origins to include.
    pub origin: OriginFilter,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific event names.
    #[must_use]
    pub fn for_events<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_names: names.into_iter().map(Into::into).collect(),
            origin: OriginFilter::Any,
        }
    }

    /// Restrict to events raised in this process.
    #[must_use]
    pub fn local_only(mut self) -> Self {
        self.origin = OriginFilter::LocalOnly;
        self
    }

    /// Restrict to events that came from the remote topic.
    #[must_use]
    pub fn remote_only(mut self) -> Self {
        self.origin = OriginFilter::RemoteOnly;
        self
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        let name_match = self.event_names.is_empty()
            || self.event_names.iter().any(|n| n == message.event_name());

        let origin_match = match self.origin {
            OriginFilter::Any => true,
            OriginFilter::LocalOnly => !message.is_remote(),
            OriginFilter::RemoteOnly => message.is_remote(),
        };

        name_match && origin_match
    }
}
