//! # Shared Types Crate
//!
//! Event contracts shared by the local bus and the Pub/Sub bridge.
//!
//! ## Design Principles
//!
//! - **Explicit discriminators**: every distributed event declares its wire
//!   name through [`Event::NAME`]. Nothing is derived from reflected type names.
//! - **Typed factories**: an [`EventDescriptor`] carries a plain function that
//!   rebuilds a concrete event from its JSON body.
//! - **Origin stays out of the payload**: the [`Origin`] marker travels next to
//!   an event on the local bus and has no serialized form.

pub mod envelope;
pub mod errors;
pub mod event;

pub use envelope::{Envelope, Origin};
pub use errors::EventCodecError;
pub use event::{DecodeFn, DomainEvent, Event, EventDescriptor};
