//! # Domain Module
//!
//! Registry, channel state, loop-prevention rules and error types.

pub mod errors;
pub mod loop_guard;
pub mod registry;
pub mod state;

pub use errors::*;
pub use loop_guard::LoopGuard;
pub use registry::EventTypeRegistry;
pub use state::ChannelState;
