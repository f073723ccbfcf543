//! # Event Type Registry
//!
//! Maps wire event names to the typed factories that rebuild them.
//!
//! Built once from the handler declarations on the local bus, then shared
//! read-only by the inbound relay.

use std::collections::HashMap;

use shared_bus::HandlerDeclaration;
use shared_types::EventDescriptor;
use tracing::{debug, warn};

use super::errors::RelayError;

/// Name to descriptor mapping for distributed event types.
#[derive(Debug, Clone, Default)]
pub struct EventTypeRegistry {
    types: HashMap<String, EventDescriptor>,
}

impl EventTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from every handler registered on the local bus.
    ///
    /// Declarations without an event type are skipped.
    #[must_use]
    pub fn from_declarations(declarations: &[HandlerDeclaration]) -> Self {
        let mut registry = Self::new();
        for declaration in declarations {
            match declaration.event {
                Some(descriptor) => registry.register(descriptor),
                None => debug!(
                    handler = %declaration.handler_name,
                    "Handler declares no event type, skipping"
                ),
            }
        }
        registry
    }

    /// Insert a descriptor. Last write wins.
    ///
    /// Registering the same type twice is a no-op. Two different types that
    /// share a name silently replace each other apart from a warning.
    pub fn register(&mut self, descriptor: EventDescriptor) {
        if let Some(previous) = self.types.insert(descriptor.name().to_string(), descriptor) {
            if !previous.same_type(&descriptor) {
                warn!(
                    event_name = descriptor.name(),
                    previous = previous.type_name(),
                    replacement = descriptor.type_name(),
                    "Event name collision, later registration wins"
                );
            }
        }
    }

    /// Look up the descriptor for a wire name.
    pub fn resolve(&self, event_name: &str) -> Result<&EventDescriptor, RelayError> {
        self.types
            .get(event_name)
            .ok_or_else(|| RelayError::UnknownEventType {
                event_name: event_name.to_string(),
            })
    }

    /// Whether a wire name is known.
    #[must_use]
    pub fn contains(&self, event_name: &str) -> bool {
        self.types.contains_key(event_name)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn event_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
