//! # ferry-transport
//!
//! The raw transport boundary the ferry protocol runs on, plus two
//! in-process implementations.
//!
//! A transport moves opaque text between contexts. The receiving side learns
//! the sender's origin from the transport itself, never from the payload,
//! and gets a handle it can reply to.
//!
//! - [`Transport`]: `transmit` / `subscribe` / `unsubscribe`
//! - [`MemoryTransport`]: records outbound traffic, injects inbound traffic
//! - [`LocalBus`]: origin-tagged contexts with per-context delivery queues

#![deny(unsafe_code)]

pub mod errors;
pub mod local;
pub mod memory;
pub mod subscribers;
pub mod transport;

pub use errors::TransportError;
pub use local::{ContextHandle, LocalBus, LocalContext};
pub use memory::{MemoryTransport, Outbound, PeerId};
pub use subscribers::SubscriberList;
pub use transport::{Inbound, InboundHandler, SubscriptionId, Transport, WILDCARD_ORIGIN};
