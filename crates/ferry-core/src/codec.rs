//! JSON wire codec for [`Envelope`].

use crate::envelope::Envelope;
use crate::errors::CodecError;

/// Serialize an envelope to its wire text.
pub fn encode(envelope: &Envelope) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(CodecError::Encode)
}

/// Parse wire text into an envelope.
///
/// Anything that is not a JSON object with a known `type`, an `id`, and a
/// string `channel` is rejected.
pub fn decode(text: &str) -> Result<Envelope, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Malformed)
}
