//! Transport error type.

use thiserror::Error;

/// Local failure to hand a message to the transport.
///
/// Success only means the transport accepted the text. It never implies
/// delivery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The target handle does not name a live context.
    #[error("unknown transport target: {0}")]
    UnknownTarget(String),

    /// The target exists but no longer accepts messages.
    #[error("transport target closed: {0}")]
    Closed(String),

    /// The transport refused the message.
    #[error("transmit rejected: {0}")]
    Rejected(String),
}
