//! # ferry-core
//!
//! Shared vocabulary for the ferry request/response protocol.
//!
//! - **Request IDs**: [`RequestId`], a 24-character alphanumeric correlation token
//! - **Envelopes**: [`Envelope`] closed union of `message`, `ack`, and `response`
//! - **Codec**: [`codec::encode`] / [`codec::decode`] for the JSON wire format
//! - **Origins**: [`OriginPattern`] exact-or-regex allowlist entries
//! - **Reasons**: wire strings reported to requesters on failure
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod codec;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod origin;
pub mod reasons;

pub use envelope::{Envelope, EnvelopeKind};
pub use errors::CodecError;
pub use ids::RequestId;
pub use origin::OriginPattern;
