//! Inbound routing: origin check, decode, then listener fan-out or
//! correlation-table resolution.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use ferry_core::reasons::{UNKNOWN_ERROR, invalid_channel};
use ferry_core::{Envelope, RequestId, codec};
use ferry_transport::{Inbound, Transport};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::correlation::invoke;
use crate::listeners::{ReplySink, Responder};
use crate::session::SessionInner;

pub(crate) fn count_settled(outcome: &'static str) {
    counter!("ferry_requests_settled_total", "outcome" => outcome).increment(1);
}

fn count_dropped(reason: &'static str) {
    counter!("ferry_envelopes_dropped_total", "reason" => reason).increment(1);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}

/// Sends a responder's envelopes back to the context a request came from,
/// addressed to the origin it came from.
struct TransportReply<T: Transport> {
    transport: Arc<T>,
    target: T::Target,
    origin: String,
}

impl<T: Transport> ReplySink for TransportReply<T> {
    fn send(&self, envelope: &Envelope) {
        let text = match codec::encode(envelope) {
            Ok(text) => text,
            Err(error) => {
                warn!(channel = envelope.channel(), %error, "failed to encode reply");
                return;
            }
        };
        if let Err(error) = self.transport.transmit(&self.target, &text, &self.origin) {
            warn!(
                channel = envelope.channel(),
                kind = %envelope.kind(),
                origin = %self.origin,
                %error,
                "reply transmit failed"
            );
        }
    }
}

impl<T: Transport> SessionInner<T> {
    /// Entry point for every inbound transport message.
    pub(crate) fn dispatch(&self, inbound: &Inbound<T::Target>) {
        let origin = inbound.origin.as_str();
        if self.is_destroyed() {
            count_dropped("destroyed");
            return;
        }

        let listen_ok = self.guard.accepts_listen(origin);
        let response_ok = self
            .guard
            .accepts_response(origin, &self.state.lock().pending);
        if !listen_ok && !response_ok {
            trace!(origin, "origin not accepted, message dropped");
            count_dropped("origin");
            return;
        }

        let envelope = match codec::decode(&inbound.text) {
            Ok(envelope) => envelope,
            Err(error) => {
                trace!(origin, %error, "not a protocol envelope, dropped");
                count_dropped("decode");
                return;
            }
        };

        match envelope {
            Envelope::Message { id, channel, data } if listen_ok => {
                self.fan_out(inbound, id, channel, &data);
            }
            Envelope::Ack { id, channel } if response_ok => {
                self.on_ack(origin, &channel, &id);
            }
            Envelope::Response {
                id,
                channel,
                success,
                data,
            } if response_ok => self.on_response(origin, &channel, &id, success, data),
            other => {
                debug!(
                    origin,
                    channel = other.channel(),
                    kind = %other.kind(),
                    "origin not accepted for envelope kind, dropped"
                );
                count_dropped("origin");
            }
        }
    }

    fn fan_out(&self, inbound: &Inbound<T::Target>, id: RequestId, channel: String, data: &Value) {
        let listeners = self.state.lock().listeners.listeners(&channel);
        let sink = TransportReply {
            transport: self.transport.clone(),
            target: inbound.source.clone(),
            origin: inbound.origin.clone(),
        };
        let responder = Responder::new(Box::new(sink), channel, id);

        let Some(listeners) = listeners else {
            debug!(
                channel = responder.channel(),
                origin = %inbound.origin,
                "request on channel without listeners"
            );
            let _ = responder.respond(false, invalid_channel(responder.channel()));
            return;
        };

        let mut failed = false;
        for (index, listener) in listeners.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.handle(data, &responder)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            failed = true;
            warn!(
                channel = responder.channel(),
                request_id = %responder.request_id(),
                index,
                %error,
                "listener failed"
            );
        }

        // A failure only answers if no other listener on the channel did.
        if failed && responder.respond(false, UNKNOWN_ERROR) {
            debug!(
                channel = responder.channel(),
                request_id = %responder.request_id(),
                "listener failure reported to requester"
            );
        } else if responder.acknowledge() {
            trace!(
                channel = responder.channel(),
                request_id = %responder.request_id(),
                "request acknowledged"
            );
        }
    }

    fn on_ack(&self, origin: &str, channel: &str, id: &RequestId) {
        let advanced = self.state.lock().pending.acknowledge(channel, id, origin);
        if advanced {
            trace!(channel, request_id = %id, "ack received");
        } else {
            trace!(channel, request_id = %id, origin, "ack matches no waiting request");
            count_dropped("unmatched");
        }
    }

    fn on_response(&self, origin: &str, channel: &str, id: &RequestId, success: bool, data: Value) {
        let record = self.state.lock().pending.take_response(channel, id, origin);
        let Some(record) = record else {
            trace!(channel, request_id = %id, origin, "response matches no pending request");
            count_dropped("unmatched");
            return;
        };
        count_settled("response");
        debug!(channel, request_id = %id, success, "response received");
        invoke(&record.callback, success, data);
    }
}
