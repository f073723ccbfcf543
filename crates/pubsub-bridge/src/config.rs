//! # Bridge Configuration
//!
//! Connection settings for the remote topic and tuning for the receive pump.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::domain::ChannelError;

/// Default number of messages requested per pull.
pub const DEFAULT_MAX_MESSAGES: u32 = 100;

/// Default wait between pulls that returned nothing.
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 250;

/// Where the bridge connects and who it is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Subscription name. Doubles as this bridge's initiator identity.
    pub subscription_name: String,

    /// Topic shared by all bridged services. Must already exist.
    pub topic_name: String,

    /// Cloud project owning the topic.
    pub project_id: String,

    /// Local or emulator transport host, e.g. `localhost`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_override: Option<String>,

    /// Port paired with `endpoint_override`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ConnectionConfig {
    /// Config for a project, topic and subscription on the default endpoint.
    pub fn new(
        project_id: impl Into<String>,
        topic_name: impl Into<String>,
        subscription_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_name: subscription_name.into(),
            topic_name: topic_name.into(),
            project_id: project_id.into(),
            endpoint_override: None,
            port: None,
        }
    }

    /// Point at a local or emulator endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>, port: Option<u16>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self.port = port;
        self
    }

    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BRIDGE_SUBSCRIPTION_NAME`: subscription and initiator identity (required)
    /// - `BRIDGE_TOPIC_NAME`: shared topic (required)
    /// - `BRIDGE_PROJECT_ID`: project (required)
    /// - `BRIDGE_ENDPOINT` or `PUBSUB_EMULATOR_HOST`: endpoint override (optional)
    /// - `BRIDGE_PORT`: port for the endpoint override (optional)
    pub fn from_env() -> Result<Self, ChannelError> {
        let port = match env::var("BRIDGE_PORT") {
            Ok(raw) => Some(raw.parse::<u16>().map_err(|e| {
                ChannelError::ConfigInvalid(format!("BRIDGE_PORT={raw}: {e}"))
            })?),
            Err(_) => None,
        };

        let config = Self {
            subscription_name: env::var("BRIDGE_SUBSCRIPTION_NAME").unwrap_or_default(),
            topic_name: env::var("BRIDGE_TOPIC_NAME").unwrap_or_default(),
            project_id: env::var("BRIDGE_PROJECT_ID").unwrap_or_default(),
            endpoint_override: env::var("BRIDGE_ENDPOINT")
                .or_else(|_| env::var("PUBSUB_EMULATOR_HOST"))
                .ok()
                .filter(|v| !v.is_empty()),
            port,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the bridge must not start with.
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.topic_name.trim().is_empty() {
            return Err(ChannelError::ConfigInvalid(
                "topic name must not be empty".to_string(),
            ));
        }
        if self.subscription_name.trim().is_empty() {
            return Err(ChannelError::ConfigInvalid(
                "subscription name must not be empty".to_string(),
            ));
        }
        if self.project_id.trim().is_empty() {
            return Err(ChannelError::ConfigInvalid(
                "project id must not be empty".to_string(),
            ));
        }
        if self.port == Some(0) {
            return Err(ChannelError::ConfigInvalid("port must not be 0".to_string()));
        }
        if matches!(self.endpoint_override.as_deref(), Some(e) if e.trim().is_empty()) {
            return Err(ChannelError::ConfigInvalid(
                "endpoint override must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Full topic resource name.
    #[must_use]
    pub fn topic_path(&self) -> String {
        format!("projects/{}/topics/{}", self.project_id, self.topic_name)
    }

    /// Full subscription resource name.
    #[must_use]
    pub fn subscription_path(&self) -> String {
        format!(
            "projects/{}/subscriptions/{}",
            self.project_id, self.subscription_name
        )
    }

    /// Endpoint override joined with its port, if any.
    #[must_use]
    pub fn service_endpoint(&self) -> Option<String> {
        let endpoint = self.endpoint_override.as_ref()?;
        Some(match self.port {
            Some(port) => format!("{endpoint}:{port}"),
            None => endpoint.clone(),
        })
    }
}

/// Receive pump tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveConfig {
    /// Messages requested per pull.
    pub max_messages: u32,
    /// Wait after an empty pull or a transport error.
    pub idle_interval: Duration,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            idle_interval: Duration::from_millis(DEFAULT_IDLE_INTERVAL_MS),
        }
    }
}

impl ReceiveConfig {
    /// Create a config for testing (short waits).
    pub fn for_testing() -> Self {
        Self {
            max_messages: 10,
            idle_interval: Duration::from_millis(5),
        }
    }
}
