//! # Outbound Ports
//!
//! The Pub/Sub transport the remote channel drives.
//!
//! Resources are addressed by full names:
//! `projects/{project}/topics/{topic}` and
//! `projects/{project}/subscriptions/{subscription}`.

use async_trait::async_trait;

use crate::domain::TransportError;

/// A subscription as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    /// Full subscription name.
    pub name: String,
    /// Full name of the topic it is attached to.
    pub topic: String,
}

/// One message handed out by a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Token used to acknowledge this delivery.
    pub ack_id: String,
    /// Transport-assigned message id.
    pub message_id: String,
    /// Raw payload.
    pub data: Vec<u8>,
}

/// Pub/Sub transport - outbound port.
#[async_trait]
pub trait PubSubTransport: Send + Sync + 'static {
    /// List existing topics in the project.
    async fn list_topics(&self) -> Result<Vec<String>, TransportError>;

    /// List existing subscriptions in the project.
    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>, TransportError>;

    /// Create a subscription bound to `topic`.
    ///
    /// Returns [`TransportError::AlreadyExists`] if another consumer created
    /// it first.
    async fn create_subscription(
        &self,
        name: &str,
        topic: &str,
    ) -> Result<SubscriptionInfo, TransportError>;

    /// Publish one payload. Returns the transport message id.
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<String, TransportError>;

    /// Pull up to `max_messages` pending messages. May return none.
    async fn pull(
        &self,
        subscription: &str,
        max_messages: u32,
    ) -> Result<Vec<ReceivedMessage>, TransportError>;

    /// Acknowledge deliveries so they are not redelivered.
    async fn acknowledge(&self, subscription: &str, ack_ids: &[String])
        -> Result<(), TransportError>;
}
