//! In-Memory Pub/Sub Adapter
//!
//! Implements `PubSubTransport` entirely in process. Used by tests and by
//! single-process demos; several bridges can share one instance by cloning it.
//!
//! Semantics follow the managed service closely enough for the bridge:
//! topics must be provisioned up front, every subscription receives its own
//! copy of each message, and pulled messages stay outstanding until acked.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::TransportError;
use crate::ports::outbound::{PubSubTransport, ReceivedMessage, SubscriptionInfo};

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct SubscriptionQueue {
    topic: String,
    pending: VecDeque<StoredMessage>,
    outstanding: HashMap<String, StoredMessage>,
}

#[derive(Debug, Default)]
struct State {
    topics: Vec<String>,
    subscriptions: BTreeMap<String, SubscriptionQueue>,
    published: HashMap<String, Vec<Vec<u8>>>,
    subscription_creations: usize,
    next_message_id: u64,
    fail_next_publish: Option<TransportError>,
    unavailable: bool,
    stale_listings: bool,
}

impl State {
    fn check_available(&self) -> Result<(), TransportError> {
        if self.unavailable {
            return Err(TransportError::Unavailable(
                "in-memory transport marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn queue_mut(&mut self, subscription: &str) -> Result<&mut SubscriptionQueue, TransportError> {
        self.subscriptions
            .get_mut(subscription)
            .ok_or_else(|| TransportError::NotFound(subscription.to_string()))
    }
}

/// Shared in-process Pub/Sub emulator.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPubSub {
    state: Arc<Mutex<State>>,
}

impl InMemoryPubSub {
    /// Create an empty emulator with no topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an emulator with the given topics provisioned.
    #[must_use]
    pub fn with_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pubsub = Self::new();
        for topic in topics {
            pubsub.create_topic(topic);
        }
        pubsub
    }

    /// Provision a topic. Operational step; the bridge never calls this.
    pub fn create_topic(&self, name: impl Into<String>) {
        let name = name.into();
        let mut state = self.state.lock();
        if !state.topics.contains(&name) {
            debug!(topic = %name, "Topic provisioned");
            state.topics.push(name);
        }
    }

    /// Names of existing subscriptions.
    #[must_use]
    pub fn subscription_names(&self) -> Vec<String> {
        self.state.lock().subscriptions.keys().cloned().collect()
    }

    /// How many subscriptions were successfully created.
    #[must_use]
    pub fn subscription_creations(&self) -> usize {
        self.state.lock().subscription_creations
    }

    /// Every payload published on `topic`, in order.
    #[must_use]
    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .published
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Messages waiting to be pulled from `subscription`.
    #[must_use]
    pub fn pending(&self, subscription: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(subscription)
            .map_or(0, |q| q.pending.len())
    }

    /// Messages pulled from `subscription` but not yet acknowledged.
    #[must_use]
    pub fn outstanding(&self, subscription: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(subscription)
            .map_or(0, |q| q.outstanding.len())
    }

    /// Put every unacknowledged message back at the front of the queue.
    pub fn redeliver_unacked(&self, subscription: &str) {
        let mut state = self.state.lock();
        if let Some(queue) = state.subscriptions.get_mut(subscription) {
            let mut unacked: Vec<StoredMessage> = queue.outstanding.drain().map(|(_, m)| m).collect();
            unacked.sort_by(|a, b| b.message_id.cmp(&a.message_id));
            for message in unacked {
                queue.pending.push_front(message);
            }
        }
    }

    /// Make the next publish fail with `error`.
    pub fn fail_next_publish(&self, error: TransportError) {
        self.state.lock().fail_next_publish = Some(error);
    }

    /// Make every call fail with `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Hide existing subscriptions from listings, as an eventually
    /// consistent listing would right after another consumer created one.
    pub fn set_stale_listings(&self, stale: bool) {
        self.state.lock().stale_listings = stale;
    }
}

#[async_trait]
impl PubSubTransport for InMemoryPubSub {
    async fn list_topics(&self) -> Result<Vec<String>, TransportError> {
        let state = self.state.lock();
        state.check_available()?;
        Ok(state.topics.clone())
    }

    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>, TransportError> {
        let state = self.state.lock();
        state.check_available()?;
        if state.stale_listings {
            return Ok(Vec::new());
        }
        Ok(state
            .subscriptions
            .iter()
            .map(|(name, queue)| SubscriptionInfo {
                name: name.clone(),
                topic: queue.topic.clone(),
            })
            .collect())
    }

    async fn create_subscription(
        &self,
        name: &str,
        topic: &str,
    ) -> Result<SubscriptionInfo, TransportError> {
        let mut state = self.state.lock();
        state.check_available()?;

        if state.subscriptions.contains_key(name) {
            return Err(TransportError::AlreadyExists(name.to_string()));
        }
        if !state.topics.iter().any(|t| t == topic) {
            return Err(TransportError::NotFound(topic.to_string()));
        }

        state.subscriptions.insert(
            name.to_string(),
            SubscriptionQueue {
                topic: topic.to_string(),
                ..SubscriptionQueue::default()
            },
        );
        state.subscription_creations += 1;
        debug!(subscription = %name, topic = %topic, "Subscription created");

        Ok(SubscriptionInfo {
            name: name.to_string(),
            topic: topic.to_string(),
        })
    }

    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<String, TransportError> {
        let mut state = self.state.lock();
        state.check_available()?;

        if let Some(error) = state.fail_next_publish.take() {
            return Err(error);
        }
        if !state.topics.iter().any(|t| t == topic) {
            return Err(TransportError::NotFound(topic.to_string()));
        }

        state.next_message_id += 1;
        let message_id = format!("{:016}", state.next_message_id);

        for queue in state.subscriptions.values_mut().filter(|q| q.topic == topic) {
            queue.pending.push_back(StoredMessage {
                message_id: message_id.clone(),
                data: data.clone(),
            });
        }
        state
            .published
            .entry(topic.to_string())
            .or_default()
            .push(data);

        Ok(message_id)
    }

    async fn pull(
        &self,
        subscription: &str,
        max_messages: u32,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let mut state = self.state.lock();
        state.check_available()?;
        let queue = state.queue_mut(subscription)?;

        let mut batch = Vec::new();
        while batch.len() < max_messages as usize {
            let Some(message) = queue.pending.pop_front() else {
                break;
            };
            let ack_id = Uuid::new_v4().to_string();
            batch.push(ReceivedMessage {
                ack_id: ack_id.clone(),
                message_id: message.message_id.clone(),
                data: message.data.clone(),
            });
            queue.outstanding.insert(ack_id, message);
        }

        Ok(batch)
    }

    async fn acknowledge(
        &self,
        subscription: &str,
        ack_ids: &[String],
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.check_available()?;
        let queue = state.queue_mut(subscription)?;

        for ack_id in ack_ids {
            queue.outstanding.remove(ack_id);
        }
        Ok(())
    }
}
