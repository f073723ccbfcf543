//! # Event Publisher
//!
//! Defines the publishing side of the event bus.

use crate::events::{BusMessage, EventFilter};
use crate::handler::HandlerDeclaration;
use crate::subscriber::{EventStream, EventSubscriber, Inbox, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use shared_types::Event;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a message to the bus.
    ///
    /// # Returns
    ///
    /// The number of active subscribers that received the message.
    async fn publish(&self, message: BusMessage) -> usize;

    /// Get the total number of messages published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// Subscribers that must not miss events (handlers, the bridge) get their own
/// unbounded queue instead. Delivery is in-process only; the Pub/Sub bridge
/// carries events further.
pub struct InMemoryEventBus {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<BusMessage>,

    /// Unbounded per-subscriber queues.
    queues: RwLock<Vec<QueueSender>>,

    /// Active subscription count by filter.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Handlers and listeners registered on this bus.
    pub(crate) declarations: RwLock<Vec<HandlerDeclaration>>,

    /// Total messages published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            queues: RwLock::new(Vec::new()),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            declarations: RwLock::new(Vec::new()),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Raise a typed event from inside this process.
    pub async fn raise<E: Event>(&self, event: E) -> usize {
        self.publish(BusMessage::local(event)).await
    }

    /// Get a stream of messages matching a filter.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let queued = self
            .queues
            .read()
            .map(|queues| queues.iter().filter(|q| !q.sender.is_closed()).count())
            .unwrap_or(0);
        self.sender.receiver_count() + queued
    }

    /// Number of live subscriptions created with `filter`.
    #[must_use]
    pub fn active_subscriptions(&self, filter: &EventFilter) -> usize {
        self.subscriptions
            .read()
            .ok()
            .and_then(|subs| subs.get(&filter_key(filter)).copied())
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push `message` onto every live queue whose filter matches.
    fn fan_out(&self, message: &BusMessage) -> usize {
        let Ok(mut queues) = self.queues.write() else {
            return 0;
        };
        queues.retain(|q| !q.sender.is_closed());
        queues
            .iter()
            .filter(|q| q.filter.matches(message))
            .filter(|q| q.sender.send(message.clone()).is_ok())
            .count()
    }

    fn track(&self, filter: &EventFilter) -> String {
        let key = filter_key(filter);
        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(key.clone()).or_insert(0) += 1;
        }
        key
    }
}

struct QueueSender {
    filter: EventFilter,
    sender: mpsc::UnboundedSender<BusMessage>,
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, filter: EventFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let key = self.track(&filter);

        debug!(events = ?filter.event_names, origin = ?filter.origin, "New subscription created");

        Subscription::new(Inbox::Broadcast(receiver), filter, self.subscriptions.clone(), key)
    }

    fn subscribe_unbounded(&self, filter: EventFilter) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let key = self.track(&filter);

        if let Ok(mut queues) = self.queues.write() {
            queues.push(QueueSender {
                filter: filter.clone(),
                sender,
            });
        }

        debug!(events = ?filter.event_names, origin = ?filter.origin, "New queued subscription created");

        Subscription::new(Inbox::Queue(receiver), filter, self.subscriptions.clone(), key)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, message: BusMessage) -> usize {
        let event_name = message.event_name();
        let remote = message.is_remote();

        self.events_published.fetch_add(1, Ordering::Relaxed);

        let queued = self.fan_out(&message);
        // Err only means no broadcast receivers.
        let broadcast = self.sender.send(message).unwrap_or(0);
        let receivers = queued + broadcast;

        if receivers == 0 {
            warn!(
                event_name = event_name,
                remote = remote,
                "Event dropped (no receivers)"
            );
        } else {
            debug!(
                event_name = event_name,
                remote = remote,
                receivers = receivers,
                "Event published"
            );
        }
        receivers
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

fn filter_key(filter: &EventFilter) -> String {
    format!("{:?}/{:?}", filter.event_names, filter.origin)
}
