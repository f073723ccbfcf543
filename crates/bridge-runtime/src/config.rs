//! # Runtime Configuration
//!
//! Everything the host reads from the environment, on top of the bridge's
//! own connection settings.

use pubsub_bridge::{ChannelError, ConnectionConfig};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default interval between metric refreshes.
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 15;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Connection settings are missing or malformed.
    #[error(transparent)]
    Connection(#[from] ChannelError),

    /// A numeric variable did not parse.
    #[error("{name}={value} is not a valid number of seconds")]
    InvalidSeconds {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },
}

/// Host configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Remote topic and identity.
    pub connection: ConnectionConfig,
    /// Bearer token for the REST transport. Not needed against the emulator.
    pub access_token: Option<String>,
    /// How often relay stats are copied into metrics.
    pub metrics_interval: Duration,
    /// Raise demo events at this interval, if set.
    pub demo_publish_interval: Option<Duration>,
}

impl RuntimeConfig {
    /// Config around an explicit connection, with default timings and no demo publisher.
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            access_token: None,
            metrics_interval: Duration::from_secs(DEFAULT_METRICS_INTERVAL_SECS),
            demo_publish_interval: None,
        }
    }

    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BRIDGE_*` connection variables (see [`ConnectionConfig::from_env`])
    /// - `BRIDGE_ACCESS_TOKEN`: bearer token (optional)
    /// - `BRIDGE_METRICS_INTERVAL_SECS`: metric refresh interval (default: 15)
    /// - `BRIDGE_DEMO_PUBLISH_SECS`: demo publisher interval (default: off)
    pub fn from_env() -> Result<Self, ConfigError> {
        let connection = ConnectionConfig::from_env()?;

        let metrics_interval = seconds("BRIDGE_METRICS_INTERVAL_SECS")?
            .unwrap_or(Duration::from_secs(DEFAULT_METRICS_INTERVAL_SECS));

        Ok(Self {
            connection,
            access_token: env::var("BRIDGE_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            metrics_interval,
            demo_publish_interval: seconds("BRIDGE_DEMO_PUBLISH_SECS")?,
        })
    }
}

fn seconds(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_seconds(name, &value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_seconds(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidSeconds {
            name,
            value: value.to_string(),
        }),
    }
}
