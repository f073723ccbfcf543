//! # Demo Publisher
//!
//! Raises a `UserCreated` and a `UserLicenseUpgraded` on the local bus at a
//! fixed interval.

use chrono::Utc;
use shared_bus::InMemoryEventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::{UserCreated, UserLicenseUpgraded, LICENSE_TYPES};

/// Demo events for round `n`.
pub fn demo_events(instance: &str, n: u64) -> (UserCreated, UserLicenseUpgraded) {
    let user_id = format!("{instance}-user{n}");
    let tier = LICENSE_TYPES[(n % LICENSE_TYPES.len() as u64) as usize];
    (
        UserCreated {
            email: format!("{user_id}@example.com"),
            user_id: user_id.clone(),
        },
        UserLicenseUpgraded {
            user_id,
            license_type: tier.to_string(),
            upgrade_date: Utc::now().to_rfc3339(),
        },
    )
}

/// Publish demo events every `interval` until shutdown.
pub fn spawn_demo_publisher(
    bus: Arc<InMemoryEventBus>,
    instance: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Demo publisher enabled");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        let mut round = 1u64;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (created, upgraded) = demo_events(&instance, round);
                    debug!(user_id = %created.user_id, "Raising demo events");
                    bus.raise(created).await;
                    bus.raise(upgraded).await;
                    round += 1;
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Demo publisher stopped");
    })
}
