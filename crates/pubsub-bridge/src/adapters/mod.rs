//! # Adapters Module
//!
//! Transport implementations of the outbound port.

pub mod in_memory;
pub mod rest;

pub use in_memory::InMemoryPubSub;
pub use rest::RestPubSub;
