//! # Event Handlers
//!
//! Typed handler registration on the local bus.
//!
//! Every registration is recorded as a [`HandlerDeclaration`]. Typed handlers
//! declare the event they consume, which is how the bridge learns the set of
//! distributed event types it must be able to rebuild from the wire.

use crate::events::{BusMessage, EventFilter};
use crate::publisher::InMemoryEventBus;
use crate::subscriber::EventSubscriber;
use async_trait::async_trait;
use shared_types::{Event, EventDescriptor, Origin};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Error returned by a failing handler. Logged, never fatal to the bus.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Handler failed: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Create a handler error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A typed consumer of one event type.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// The event this handler consumes.
    type Event: Event;

    /// Handle one event. `origin` is set when the event came from another service.
    async fn handle(&self, event: &Self::Event, origin: Option<&Origin>) -> Result<(), HandlerError>;
}

/// Record of one handler or listener registered on the bus.
#[derive(Debug, Clone)]
pub struct HandlerDeclaration {
    /// Name given at registration, used in logs.
    pub handler_name: String,
    /// Event type the handler declared interest in. `None` for untyped listeners.
    pub event: Option<EventDescriptor>,
}

impl InMemoryEventBus {
    /// Register a typed handler and start dispatching its events.
    ///
    /// The subscription is created before this returns, so events raised
    /// afterwards are never missed. Each handler reads from its own unbounded
    /// queue, so a slow handler never loses events. Must be called inside a
    /// tokio runtime.
    pub fn register_handler<H: EventHandler>(
        &self,
        handler_name: impl Into<String>,
        handler: Arc<H>,
    ) -> JoinHandle<()> {
        let handler_name = handler_name.into();
        let descriptor = EventDescriptor::of::<H::Event>();
        let mut subscription =
            self.subscribe_unbounded(EventFilter::for_events([descriptor.name()]));

        self.declare(HandlerDeclaration {
            handler_name: handler_name.clone(),
            event: Some(descriptor),
        });
        debug!(handler = %handler_name, event_name = descriptor.name(), "Handler registered");

        tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                let Some(event) = message.downcast::<H::Event>() else {
                    warn!(
                        handler = %handler_name,
                        event_name = message.event_name(),
                        "Event name matched but type did not, skipping"
                    );
                    continue;
                };

                if let Err(e) = handler.handle(event, message.origin()).await {
                    warn!(handler = %handler_name, error = %e, "Event handler failed");
                }
            }
            debug!(handler = %handler_name, "Handler stopped (bus closed)");
        })
    }

    /// Register an untyped listener over raw bus messages.
    ///
    /// Listeners declare no event type, so the bridge does not learn any
    /// distributed types from them.
    pub fn register_listener<F, Fut>(
        &self,
        listener_name: impl Into<String>,
        filter: EventFilter,
        listener: F,
    ) -> JoinHandle<()>
    where
        F: Fn(BusMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener_name = listener_name.into();
        let mut subscription = self.subscribe_unbounded(filter);

        self.declare(HandlerDeclaration {
            handler_name: listener_name.clone(),
            event: None,
        });
        debug!(listener = %listener_name, "Listener registered");

        tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                listener(message).await;
            }
            debug!(listener = %listener_name, "Listener stopped (bus closed)");
        })
    }

    /// Every handler and listener registered so far.
    #[must_use]
    pub fn handler_declarations(&self) -> Vec<HandlerDeclaration> {
        self.declarations
            .read()
            .map(|decls| decls.clone())
            .unwrap_or_default()
    }

    fn declare(&self, declaration: HandlerDeclaration) {
        if let Ok(mut decls) = self.declarations.write() {
            decls.push(declaration);
        }
    }
}
