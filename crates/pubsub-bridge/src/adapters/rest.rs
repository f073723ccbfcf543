//! Pub/Sub REST Adapter
//!
//! Implements `PubSubTransport` over the Pub/Sub v1 REST API. Works against
//! the managed service (with a bearer token) and against the local emulator
//! (plain HTTP via the endpoint override).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::domain::TransportError;
use crate::ports::outbound::{PubSubTransport, ReceivedMessage, SubscriptionInfo};

/// Managed service base URL.
pub const DEFAULT_API_BASE: &str = "https://pubsub.googleapis.com";

/// Per-request timeout.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// REST client for one project.
pub struct RestPubSub {
    client: Client,
    base_url: String,
    project_id: String,
    access_token: Option<String>,
}

impl RestPubSub {
    /// Build a client for the endpoint and project in `config`.
    pub fn new(config: &ConnectionConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let base_url = base_url_for(config);
        debug!(base_url = %base_url, project = %config.project_id, "Pub/Sub REST client created");

        Ok(Self {
            client,
            base_url,
            project_id: config.project_id.clone(),
            access_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, resource: &str) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.base_url, resource);
        let builder = self.client.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, TransportError> {
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PubSubTransport for RestPubSub {
    async fn list_topics(&self) -> Result<Vec<String>, TransportError> {
        let resource = format!("projects/{}/topics", self.project_id);
        let mut topics = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut builder = self.request(Method::GET, &resource);
            if let Some(token) = &page_token {
                builder = builder.query(&[("pageToken", token)]);
            }
            let page: ListTopicsResponse = self.send(builder).await?;
            topics.extend(page.topics.into_iter().map(|t| t.name));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(topics)
    }

    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>, TransportError> {
        let resource = format!("projects/{}/subscriptions", self.project_id);
        let mut subscriptions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut builder = self.request(Method::GET, &resource);
            if let Some(token) = &page_token {
                builder = builder.query(&[("pageToken", token)]);
            }
            let page: ListSubscriptionsResponse = self.send(builder).await?;
            subscriptions.extend(page.subscriptions.into_iter().map(|s| SubscriptionInfo {
                name: s.name,
                topic: s.topic,
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(subscriptions)
    }

    async fn create_subscription(
        &self,
        name: &str,
        topic: &str,
    ) -> Result<SubscriptionInfo, TransportError> {
        let builder = self
            .request(Method::PUT, name)
            .json(&CreateSubscriptionRequest { topic });
        let created: SubscriptionResource = self.send(builder).await?;

        Ok(SubscriptionInfo {
            name: created.name,
            topic: created.topic,
        })
    }

    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<String, TransportError> {
        let request = PublishRequest {
            messages: vec![OutgoingMessage {
                data: BASE64.encode(data),
            }],
        };
        let builder = self
            .request(Method::POST, &format!("{topic}:publish"))
            .json(&request);
        let response: PublishResponse = self.send(builder).await?;

        response.message_ids.into_iter().next().ok_or_else(|| {
            TransportError::InvalidResponse("publish returned no message id".to_string())
        })
    }

    async fn pull(
        &self,
        subscription: &str,
        max_messages: u32,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let builder = self
            .request(Method::POST, &format!("{subscription}:pull"))
            .json(&PullRequest { max_messages });
        let response: PullResponse = self.send(builder).await?;
        Ok(into_received(response))
    }

    async fn acknowledge(
        &self,
        subscription: &str,
        ack_ids: &[String],
    ) -> Result<(), TransportError> {
        if ack_ids.is_empty() {
            return Ok(());
        }
        let builder = self
            .request(Method::POST, &format!("{subscription}:acknowledge"))
            .json(&AcknowledgeRequest { ack_ids });
        let _: Empty = self.send(builder).await?;
        Ok(())
    }
}

/// Base URL for a configuration: the override over plain HTTP, or the
/// managed service.
pub(crate) fn base_url_for(config: &ConnectionConfig) -> String {
    match config.service_endpoint() {
        Some(endpoint) if endpoint.starts_with("http://") || endpoint.starts_with("https://") => {
            endpoint.trim_end_matches('/').to_string()
        }
        Some(endpoint) => format!("http://{}", endpoint.trim_end_matches('/')),
        None => DEFAULT_API_BASE.to_string(),
    }
}

/// Map an HTTP failure onto the transport taxonomy.
pub(crate) fn status_error(status: StatusCode, body: String) -> TransportError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthenticated(detail),
        StatusCode::NOT_FOUND => TransportError::NotFound(detail),
        StatusCode::CONFLICT => TransportError::AlreadyExists(detail),
        StatusCode::TOO_MANY_REQUESTS => TransportError::Unavailable(detail),
        s if s.is_server_error() => TransportError::Unavailable(detail),
        _ => TransportError::Rejected(detail),
    }
}

/// Undecodable payloads come through empty so the pump acks and drops them
/// without holding back the rest of the batch.
fn into_received(response: PullResponse) -> Vec<ReceivedMessage> {
    response
        .received_messages
        .into_iter()
        .map(|received| {
            let data = BASE64
                .decode(received.message.data.as_bytes())
                .unwrap_or_else(|e| {
                    warn!(
                        message_id = %received.message.message_id,
                        error = %e,
                        "Undecodable message data"
                    );
                    Vec::new()
                });
            ReceivedMessage {
                ack_id: received.ack_id,
                message_id: received.message.message_id,
                data,
            }
        })
        .collect()
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTopicsResponse {
    #[serde(default)]
    topics: Vec<TopicResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopicResource {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListSubscriptionsResponse {
    #[serde(default)]
    subscriptions: Vec<SubscriptionResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResource {
    name: String,
    topic: String,
}

#[derive(Debug, Serialize)]
struct CreateSubscriptionRequest<'a> {
    topic: &'a str,
}

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<OutgoingMessage>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceivedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceivedMessage {
    ack_id: String,
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    data: String,
    message_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest<'a> {
    ack_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct Empty {}
