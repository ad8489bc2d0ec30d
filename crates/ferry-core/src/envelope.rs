//! Protocol envelope.
//!
//! One [`Envelope`] travels per hop: the request hop carries a `message`, the
//! optional acknowledgement hop an `ack`, and the final hop a `response`. The
//! wire form is a JSON object tagged by `type`:
//!
//! ```json
//! {"type":"message","id":"…","channel":"ping","data":"x"}
//! {"type":"ack","id":"…","channel":"ping"}
//! {"type":"response","id":"…","channel":"ping","success":true,"data":"pong"}
//! ```
//!
//! `ack` is also accepted under its legacy name `listening`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::RequestId;

/// One protocol-level message unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Request sent to a remote listener.
    Message {
        /// Correlation token.
        id: RequestId,
        /// Logical endpoint name.
        channel: String,
        /// Channel-defined payload.
        #[serde(default)]
        data: Value,
    },
    /// A remote listener has taken the request; a response may follow.
    #[serde(alias = "listening")]
    Ack {
        /// Correlation token of the request being acknowledged.
        id: RequestId,
        /// Channel of the request being acknowledged.
        channel: String,
    },
    /// Final answer to a request.
    Response {
        /// Correlation token of the request being answered.
        id: RequestId,
        /// Channel of the request being answered.
        channel: String,
        /// Whether the listener handled the request successfully.
        #[serde(default = "default_success")]
        success: bool,
        /// Answer payload, or a failure reason when `success` is false.
        #[serde(default)]
        data: Value,
    },
}

fn default_success() -> bool {
    true
}

/// Discriminant of an [`Envelope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// `message`
    Message,
    /// `ack`
    Ack,
    /// `response`
    Response,
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Ack => write!(f, "ack"),
            Self::Response => write!(f, "response"),
        }
    }
}

impl Envelope {
    /// Build a request envelope.
    pub fn message(id: RequestId, channel: impl Into<String>, data: Value) -> Self {
        Self::Message {
            id,
            channel: channel.into(),
            data,
        }
    }

    /// Build an acknowledgement for a received request.
    pub fn ack(id: RequestId, channel: impl Into<String>) -> Self {
        Self::Ack {
            id,
            channel: channel.into(),
        }
    }

    /// Build a response for a received request.
    pub fn response(id: RequestId, channel: impl Into<String>, success: bool, data: Value) -> Self {
        Self::Response {
            id,
            channel: channel.into(),
            success,
            data,
        }
    }

    /// Correlation token.
    pub fn id(&self) -> &RequestId {
        match self {
            Self::Message { id, .. } | Self::Ack { id, .. } | Self::Response { id, .. } => id,
        }
    }

    /// Channel name.
    pub fn channel(&self) -> &str {
        match self {
            Self::Message { channel, .. }
            | Self::Ack { channel, .. }
            | Self::Response { channel, .. } => channel,
        }
    }

    /// Envelope discriminant.
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Message { .. } => EnvelopeKind::Message,
            Self::Ack { .. } => EnvelopeKind::Ack,
            Self::Response { .. } => EnvelopeKind::Response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_wire_shape() {
        let env = Envelope::message(RequestId::from("r1"), "ping", json!("x"));
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            json!({"type": "message", "id": "r1", "channel": "ping", "data": "x"})
        );
    }

    #[test]
    fn ack_wire_shape() {
        let env = Envelope::ack(RequestId::from("r1"), "ping");
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({"type": "ack", "id": "r1", "channel": "ping"}));
    }

    #[test]
    fn response_wire_shape() {
        let env = Envelope::response(RequestId::from("r1"), "ping", false, json!("nope"));
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            json!({"type": "response", "id": "r1", "channel": "ping", "success": false, "data": "nope"})
        );
    }

    #[test]
    fn accessors() {
        let env = Envelope::response(RequestId::from("abc"), "chan", true, Value::Null);
        assert_eq!(env.id().as_str(), "abc");
        assert_eq!(env.channel(), "chan");
        assert_eq!(env.kind(), EnvelopeKind::Response);
    }

    #[test]
    fn kind_display() {
        assert_eq!(EnvelopeKind::Message.to_string(), "message");
        assert_eq!(EnvelopeKind::Ack.to_string(), "ack");
        assert_eq!(EnvelopeKind::Response.to_string(), "response");
    }

    #[test]
    fn legacy_listening_decodes_as_ack() {
        let env: Envelope =
            serde_json::from_value(json!({"type": "listening", "id": "9", "channel": "c"}))
                .unwrap();
        assert_eq!(env, Envelope::ack(RequestId::from("9"), "c"));
    }

    #[test]
    fn response_without_success_defaults_to_true() {
        let env: Envelope =
            serde_json::from_value(json!({"type": "response", "id": "9", "channel": "c"}))
                .unwrap();
        assert_eq!(
            env,
            Envelope::response(RequestId::from("9"), "c", true, Value::Null)
        );
    }

    #[test]
    fn message_without_data_decodes_as_null() {
        let env: Envelope =
            serde_json::from_value(json!({"type": "message", "id": "9", "channel": "c"}))
                .unwrap();
        assert_eq!(env, Envelope::message(RequestId::from("9"), "c", Value::Null));
    }
}
