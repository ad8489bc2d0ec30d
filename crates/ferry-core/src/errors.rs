//! Codec error type.

use thiserror::Error;

/// Failure to encode or decode an [`Envelope`](crate::Envelope).
///
/// A decode failure means the text is not a ferry envelope. Transports are
/// shared with unrelated traffic, so callers treat it as "not ours" and drop
/// the message rather than surfacing it.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The text is not a well-formed envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}
