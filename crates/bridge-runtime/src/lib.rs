//! # Bridge Runtime Library
//!
//! Host wiring for one bridged service instance. The binary in `main.rs`
//! reads the environment and runs a [`BridgeRuntime`] over the REST
//! transport; tests run the same wiring over the in-memory transport.
//!
//! - `config` - environment configuration
//! - `events` - demo events and handlers
//! - `demo` - periodic demo publisher
//! - `reporter` - metrics reporter and transport error observer
//! - `runtime` - startup and shutdown sequence

#![warn(missing_docs)]

pub mod config;
pub mod demo;
pub mod events;
pub mod reporter;
pub mod runtime;

pub use config::{ConfigError, RuntimeConfig};
pub use events::{LicenseUpgradeHandler, UserCreated, UserCreatedHandler, UserLicenseUpgraded};
pub use runtime::BridgeRuntime;
