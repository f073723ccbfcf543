//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.

use crate::events::{BusMessage, EventFilter};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{ready, Context, Poll};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, UnboundedReceiverStream};
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// Trait for subscribing to events from the bus.
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to events matching a filter.
    ///
    /// Backed by the shared broadcast ring: a subscriber that falls more than
    /// the bus capacity behind skips the overwritten events.
    fn subscribe(&self, filter: EventFilter) -> Subscription;

    /// Subscribe through a dedicated unbounded queue.
    ///
    /// Never lags; every matching event is kept until received.
    fn subscribe_unbounded(&self, filter: EventFilter) -> Subscription;
}

/// Where a subscription reads from.
pub(crate) enum Inbox {
    Broadcast(broadcast::Receiver<BusMessage>),
    Queue(mpsc::UnboundedReceiver<BusMessage>),
}

/// Keeps the per-filter subscription count honest.
struct SubscriptionTracker {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    filter_key: String,
}

impl Drop for SubscriptionTracker {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.filter_key) else {
            debug!(filter = %self.filter_key, "Subscription dropped");
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.filter_key);
        }
        debug!(filter = %self.filter_key, "Subscription dropped");
    }
}

/// A subscription handle for receiving events.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    inbox: Inbox,
    filter: EventFilter,
    _tracker: SubscriptionTracker,
}

impl Subscription {
    pub(crate) fn new(
        inbox: Inbox,
        filter: EventFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        filter_key: String,
    ) -> Self {
        Self {
            inbox,
            filter,
            _tracker: SubscriptionTracker {
                subscriptions,
                filter_key,
            },
        }
    }

    /// Receive the next message that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next matching message
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            let message = match &mut self.inbox {
                Inbox::Queue(receiver) => receiver.recv().await?,
                Inbox::Broadcast(receiver) => match receiver.recv().await {
                    Ok(m) => m,
                    Err(broadcast::error::RecvError::Closed) => return None,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!(lagged = count, "Subscriber lagged, some events dropped");
                        continue;
                    }
                },
            };

            if self.filter.matches(&message) {
                return Some(message);
            }
        }
    }

    /// Try to receive the next message without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available and matched
    /// - `Ok(None)` - No message available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        loop {
            let message = match &mut self.inbox {
                Inbox::Queue(receiver) => match receiver.try_recv() {
                    Ok(m) => m,
                    Err(mpsc::error::TryRecvError::Empty) => return Ok(None),
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        return Err(SubscriptionError::Closed)
                    }
                },
                Inbox::Broadcast(receiver) => match receiver.try_recv() {
                    Ok(m) => m,
                    Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                    Err(broadcast::error::TryRecvError::Closed) => {
                        return Err(SubscriptionError::Closed)
                    }
                    Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                },
            };

            if self.filter.matches(&message) {
                return Ok(Some(message));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Turn the subscription into a `Stream`.
    #[must_use]
    pub fn into_stream(self) -> EventStream {
        EventStream::new(self)
    }
}

enum StreamInbox {
    Broadcast(BroadcastStream<BusMessage>),
    Queue(UnboundedReceiverStream<BusMessage>),
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    inner: StreamInbox,
    filter: EventFilter,
    _tracker: SubscriptionTracker,
}

impl EventStream {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let Subscription {
            inbox,
            filter,
            _tracker,
        } = subscription;

        let inner = match inbox {
            Inbox::Broadcast(receiver) => StreamInbox::Broadcast(BroadcastStream::new(receiver)),
            Inbox::Queue(receiver) => StreamInbox::Queue(UnboundedReceiverStream::new(receiver)),
        };

        Self {
            inner,
            filter,
            _tracker,
        }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let next = match &mut self.inner {
                StreamInbox::Queue(inner) => ready!(Pin::new(inner).poll_next(cx)).map(Ok),
                StreamInbox::Broadcast(inner) => ready!(Pin::new(inner).poll_next(cx)),
            };

            match next {
                Some(Ok(message)) => {
                    if self.filter.matches(&message) {
                        return Poll::Ready(Some(message));
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(count))) => {
                    warn!(lagged = count, "Event stream lagged, some events dropped");
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
