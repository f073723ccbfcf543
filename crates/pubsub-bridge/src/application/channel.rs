//! # Remote Channel
//!
//! Owns the topic/subscription pair for one bridge instance.
//!
//! ## Connect Sequence
//!
//! 1. Validate the configuration.
//! 2. Find the topic among existing topics. Never create it.
//! 3. Find the subscription among those reading from that topic, or create
//!    it. A subscription of the same name on another topic is an error.
//!    Losing a creation race attaches to the winner's subscription.
//! 4. Start the receive pump; transport errors go to the error observer.
//! 5. `Ready`.
//!
//! ## Acknowledgement
//!
//! The pump acknowledges a pulled batch as soon as every envelope in it has
//! been handed to the inbound queue, before the bridge has delivered them
//! locally. A crash in between loses those messages.

use parking_lot::{Mutex, RwLock};
use shared_types::Envelope;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use crate::config::{ConnectionConfig, ReceiveConfig};
use crate::domain::{ChannelError, ChannelState, TransportError};
use crate::ports::outbound::{PubSubTransport, SubscriptionInfo};

/// Buffered transport errors per observer before it starts lagging.
pub const ERROR_OBSERVER_CAPACITY: usize = 64;

/// Lazy, unbounded stream of inbound envelopes.
pub type EnvelopeStream = UnboundedReceiverStream<Envelope>;

/// Resolved resources of a ready channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Full topic name.
    pub topic: String,
    /// Full subscription name.
    pub subscription: String,
}

/// Remote topic/subscription pair with an ack-on-hand-off receive stream.
pub struct RemoteChannel<T: PubSubTransport> {
    transport: Arc<T>,
    receive_config: ReceiveConfig,
    state: watch::Sender<ChannelState>,
    binding: RwLock<Option<Binding>>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    errors: broadcast::Sender<TransportError>,
}

impl<T: PubSubTransport> RemoteChannel<T> {
    /// Create a disconnected channel over `transport`.
    pub fn new(transport: Arc<T>, receive_config: ReceiveConfig) -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        let (errors, _) = broadcast::channel(ERROR_OBSERVER_CAPACITY);
        Self {
            transport,
            receive_config,
            state,
            binding: RwLock::new(None),
            inbound: Mutex::new(None),
            pump: Mutex::new(None),
            errors,
        }
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Observe transport errors. Errors never stop the channel.
    pub fn errors(&self) -> broadcast::Receiver<TransportError> {
        self.errors.subscribe()
    }

    /// Topic and subscription in use, once ready.
    pub fn binding(&self) -> Option<Binding> {
        self.binding.read().clone()
    }

    /// Run the connect sequence.
    ///
    /// Allowed from `Disconnected` and `Failed`. On error the channel is left
    /// in `Failed` and the error is returned to the caller, who decides
    /// whether to try again.
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<(), ChannelError> {
        let mut previous = ChannelState::Disconnected;
        let claimed = self.state.send_if_modified(|state| {
            previous = *state;
            if state.can_connect() {
                *state = ChannelState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(ChannelError::AlreadyConnected { state: previous });
        }

        info!(
            project = %config.project_id,
            topic = %config.topic_name,
            subscription = %config.subscription_name,
            "Connecting remote channel"
        );

        match self.establish(config).await {
            Ok(binding) => {
                let (sink, inbound) = mpsc::unbounded_channel();
                let pump = tokio::spawn(pump_messages(
                    self.transport.clone(),
                    binding.subscription.clone(),
                    sink,
                    self.errors.clone(),
                    self.receive_config.clone(),
                ));

                *self.inbound.lock() = Some(inbound);
                if let Some(stale) = self.pump.lock().replace(pump) {
                    stale.abort();
                }
                info!(
                    topic = %binding.topic,
                    subscription = %binding.subscription,
                    "Remote channel ready"
                );
                *self.binding.write() = Some(binding);
                self.state.send_replace(ChannelState::Ready);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Remote channel setup failed");
                if let ChannelError::Transport(transport_error) = &e {
                    let _ = self.errors.send(transport_error.clone());
                }
                self.state.send_replace(ChannelState::Failed);
                Err(e)
            }
        }
    }

    /// Hand an envelope to the transport.
    ///
    /// Returns the transport message id. Delivery past this point is the
    /// transport's job.
    pub async fn publish(&self, envelope: &Envelope) -> Result<String, ChannelError> {
        let topic = self.ready_topic()?;
        let data = envelope.to_bytes()?;

        match self.transport.publish(&topic, data).await {
            Ok(message_id) => {
                debug!(
                    event_name = %envelope.event_name,
                    message_id = %message_id,
                    "Envelope published"
                );
                Ok(message_id)
            }
            Err(e) => {
                report_error(&self.errors, &topic, e.clone());
                Err(ChannelError::Transport(e))
            }
        }
    }

    /// Take the inbound envelope stream.
    ///
    /// Available once per successful connect.
    pub fn receive(&self) -> Result<EnvelopeStream, ChannelError> {
        let state = self.state();
        if !state.is_ready() {
            return Err(ChannelError::ChannelNotReady { state });
        }

        self.inbound
            .lock()
            .take()
            .map(UnboundedReceiverStream::new)
            .ok_or(ChannelError::ReceiveStreamTaken)
    }

    /// Stop the receive pump and forget the binding.
    pub fn disconnect(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.inbound.lock().take();
        self.binding.write().take();
        self.state.send_replace(ChannelState::Disconnected);
        info!("Remote channel disconnected");
    }

    fn ready_topic(&self) -> Result<String, ChannelError> {
        let state = self.state();
        match (state, self.binding.read().as_ref()) {
            (ChannelState::Ready, Some(binding)) => Ok(binding.topic.clone()),
            _ => Err(ChannelError::ChannelNotReady { state }),
        }
    }

    async fn establish(&self, config: &ConnectionConfig) -> Result<Binding, ChannelError> {
        config.validate()?;
        let topic = self.resolve_topic(config).await?;
        let subscription = self.resolve_subscription(config, &topic).await?;
        Ok(Binding {
            topic,
            subscription,
        })
    }

    async fn resolve_topic(&self, config: &ConnectionConfig) -> Result<String, ChannelError> {
        let topics = self.transport.list_topics().await?;

        match_resource(&topics, |t| t.as_str(), &config.topic_path(), &config.topic_name)
            .cloned()
            .ok_or_else(|| ChannelError::TopicNotFound {
                topic: config.topic_name.clone(),
            })
    }

    async fn resolve_subscription(
        &self,
        config: &ConnectionConfig,
        topic: &str,
    ) -> Result<String, ChannelError> {
        let path = config.subscription_path();
        let existing = self.transport.list_subscriptions().await?;
        let on_topic: Vec<&SubscriptionInfo> =
            existing.iter().filter(|s| s.topic == topic).collect();

        let found = on_topic
            .iter()
            .find(|s| s.name == path)
            .or_else(|| {
                on_topic
                    .iter()
                    .find(|s| last_segment(&s.name) == config.subscription_name)
            });
        if let Some(found) = found {
            info!(subscription = %found.name, "Attaching to existing subscription");
            return Ok(found.name.clone());
        }

        if let Some(elsewhere) = existing.iter().find(|s| s.name == path) {
            return Err(ChannelError::SubscriptionOnOtherTopic {
                subscription: elsewhere.name.clone(),
                bound_topic: elsewhere.topic.clone(),
                topic: topic.to_string(),
            });
        }

        match self.transport.create_subscription(&path, topic).await {
            Ok(created) => {
                info!(subscription = %created.name, topic = %topic, "Subscription created");
                Ok(created.name)
            }
            Err(TransportError::AlreadyExists(_)) => {
                info!(
                    subscription = %path,
                    "Subscription created concurrently elsewhere, attaching"
                );
                Ok(path)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<T: PubSubTransport> Drop for RemoteChannel<T> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}

/// Pick a topic by exact full name, then by last path segment, then by
/// substring of the configured short name.
fn match_resource<'a, R>(
    resources: &'a [R],
    name_of: impl Fn(&R) -> &str,
    full_name: &str,
    short_name: &str,
) -> Option<&'a R> {
    resources
        .iter()
        .find(|r| name_of(r) == full_name)
        .or_else(|| {
            resources
                .iter()
                .find(|r| last_segment(name_of(r)) == short_name)
        })
        .or_else(|| resources.iter().find(|r| name_of(r).contains(short_name)))
}

fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn report_error(errors: &broadcast::Sender<TransportError>, resource: &str, error: TransportError) {
    error!(resource = %resource, error = %error, "Transport error");
    let _ = errors.send(error);
}

async fn pump_messages<T: PubSubTransport>(
    transport: Arc<T>,
    subscription: String,
    sink: mpsc::UnboundedSender<Envelope>,
    errors: broadcast::Sender<TransportError>,
    config: ReceiveConfig,
) {
    debug!(subscription = %subscription, "Receive pump started");

    loop {
        if sink.is_closed() {
            debug!(subscription = %subscription, "Inbound stream dropped, stopping receive pump");
            return;
        }

        let batch = match transport.pull(&subscription, config.max_messages).await {
            Ok(batch) => batch,
            Err(e) => {
                report_error(&errors, &subscription, e);
                sleep(config.idle_interval).await;
                continue;
            }
        };

        if batch.is_empty() {
            sleep(config.idle_interval).await;
            continue;
        }

        let mut ack_ids = Vec::with_capacity(batch.len());
        let mut closed = false;

        for message in batch {
            match Envelope::from_bytes(&message.data) {
                Ok(envelope) => {
                    if sink.send(envelope).is_err() {
                        closed = true;
                        break;
                    }
                }
                Err(e) => warn!(
                    message_id = %message.message_id,
                    error = %e,
                    "Dropping malformed message"
                ),
            }
            ack_ids.push(message.ack_id);
        }

        if !ack_ids.is_empty() {
            if let Err(e) = transport.acknowledge(&subscription, &ack_ids).await {
                report_error(&errors, &subscription, e);
            }
        }

        if closed {
            debug!(subscription = %subscription, "Inbound stream dropped, stopping receive pump");
            return;
        }
    }
}
