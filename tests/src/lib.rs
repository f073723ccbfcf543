//! # Pub/Sub Bridge Test Suite
//!
//! Cross-crate scenarios: several bridge instances sharing one in-memory
//! Pub/Sub transport, each with its own local bus.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs      # Events, handlers, instance helpers
//!     ├── relay_flows.rs   # Echo prevention and fan-out across instances
//!     └── channel_setup.rs # Connect races, missing topics, transport faults
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bridge-tests
//! cargo test -p bridge-tests integration::relay_flows::
//! ```

pub mod integration;
