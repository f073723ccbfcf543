//! # Demo Events
//!
//! Two user events and their handlers. Enough for two runtime instances on
//! one emulator to show events crossing the bridge in both directions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_bus::{EventHandler, HandlerError};
use shared_types::{Event, Origin};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// A user account was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    /// User id
    pub user_id: String,
    /// Contact address
    pub email: String,
}

impl Event for UserCreated {
    const NAME: &'static str = "UserCreated";
}

/// A user moved to a different license tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLicenseUpgraded {
    /// User id
    pub user_id: String,
    /// New tier (`basic`, `premium`, `enterprise`)
    pub license_type: String,
    /// RFC 3339 timestamp
    pub upgrade_date: String,
}

impl Event for UserLicenseUpgraded {
    const NAME: &'static str = "UserLicenseUpgraded";
}

/// License tiers the demo publisher cycles through.
pub const LICENSE_TYPES: [&str; 3] = ["basic", "premium", "enterprise"];

fn source(origin: Option<&Origin>) -> &str {
    origin.map_or("local", Origin::initiator)
}

/// Logs every `UserCreated`.
#[derive(Debug, Default)]
pub struct UserCreatedHandler {
    received: AtomicU64,
}

impl UserCreatedHandler {
    /// Events handled so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventHandler for UserCreatedHandler {
    type Event = UserCreated;

    async fn handle(&self, event: &UserCreated, origin: Option<&Origin>) -> Result<(), HandlerError> {
        if event.email.is_empty() {
            return Err(HandlerError::new(format!("user {} has no email", event.user_id)));
        }
        self.received.fetch_add(1, Ordering::Relaxed);
        info!(
            user_id = %event.user_id,
            email = %event.email,
            source = source(origin),
            "UserCreated received"
        );
        Ok(())
    }
}

/// Logs every `UserLicenseUpgraded`.
#[derive(Debug, Default)]
pub struct LicenseUpgradeHandler {
    received: AtomicU64,
}

impl LicenseUpgradeHandler {
    /// Events handled so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventHandler for LicenseUpgradeHandler {
    type Event = UserLicenseUpgraded;

    async fn handle(
        &self,
        event: &UserLicenseUpgraded,
        origin: Option<&Origin>,
    ) -> Result<(), HandlerError> {
        self.received.fetch_add(1, Ordering::Relaxed);
        info!(
            user_id = %event.user_id,
            license_type = %event.license_type,
            upgrade_date = %event.upgrade_date,
            source = source(origin),
            "UserLicenseUpgraded received"
        );
        Ok(())
    }
}
