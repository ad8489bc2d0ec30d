//! Per-channel listeners and the single-answer responder.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ferry_core::{Envelope, RequestId};
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a listener. The requester only ever sees
/// `"Unknown Error"`; the message stays in the local log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Create a handler error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Trait implemented by every channel listener.
///
/// Closures of the form `Fn(&Value, &Responder) -> Result<(), HandlerError>`
/// implement it.
pub trait Listener: Send + Sync {
    /// Handle one inbound request. Answer through `responder`, now or later.
    fn handle(&self, data: &Value, responder: &Responder) -> Result<(), HandlerError>;
}

impl<F> Listener for F
where
    F: Fn(&Value, &Responder) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, data: &Value, responder: &Responder) -> Result<(), HandlerError> {
        self(data, responder)
    }
}

/// Where a responder's envelopes go.
pub(crate) trait ReplySink: Send + Sync {
    fn send(&self, envelope: &Envelope);
}

struct ResponderInner {
    sink: Box<dyn ReplySink>,
    channel: String,
    id: RequestId,
    responded: AtomicBool,
}

/// One-shot answer capability for one inbound request.
///
/// Clones share state: across all of them exactly one `respond` call sends a
/// `response` envelope, and every later call is a no-op. A listener may keep
/// a clone and answer after it returns.
#[derive(Clone)]
pub struct Responder {
    inner: Arc<ResponderInner>,
}

impl Responder {
    pub(crate) fn new(sink: Box<dyn ReplySink>, channel: String, id: RequestId) -> Self {
        Self {
            inner: Arc::new(ResponderInner {
                sink,
                channel,
                id,
                responded: AtomicBool::new(false),
            }),
        }
    }

    /// Send the response. Returns `false` if this exchange was already answered.
    pub fn respond(&self, success: bool, data: impl Into<Value>) -> bool {
        if self.inner.responded.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.sink.send(&Envelope::response(
            self.inner.id.clone(),
            self.inner.channel.clone(),
            success,
            data.into(),
        ));
        true
    }

    /// Whether a response has been sent.
    pub fn has_responded(&self) -> bool {
        self.inner.responded.load(Ordering::Acquire)
    }

    /// Channel of the request being answered.
    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    /// Id of the request being answered.
    pub fn request_id(&self) -> &RequestId {
        &self.inner.id
    }

    /// Tell the requester a listener has the request, unless it was
    /// already answered.
    pub(crate) fn acknowledge(&self) -> bool {
        if self.has_responded() {
            return false;
        }
        self.inner
            .sink
            .send(&Envelope::ack(self.inner.id.clone(), self.inner.channel.clone()));
        true
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("channel", &self.inner.channel)
            .field("id", &self.inner.id)
            .field("responded", &self.has_responded())
            .finish()
    }
}

/// Ordered listeners per channel.
#[derive(Default)]
pub struct ListenerRegistry {
    channels: HashMap<String, Vec<Arc<dyn Listener>>>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener to `channel`.
    pub fn register(&mut self, channel: &str, listener: Arc<dyn Listener>) {
        self.channels
            .entry(channel.to_owned())
            .or_default()
            .push(listener);
    }

    /// Snapshot of `channel`'s listeners in registration order, or `None`
    /// if nobody listens on it.
    pub fn listeners(&self, channel: &str) -> Option<Vec<Arc<dyn Listener>>> {
        self.channels.get(channel).cloned()
    }

    /// Number of listeners on `channel`.
    pub fn listener_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, Vec::len)
    }

    /// Number of channels with listeners.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<Envelope>>);

    impl ReplySink for Arc<Capture> {
        fn send(&self, envelope: &Envelope) {
            self.0.lock().push(envelope.clone());
        }
    }

    fn responder() -> (Responder, Arc<Capture>) {
        let capture = Arc::new(Capture::default());
        let r = Responder::new(Box::new(capture.clone()), "ping".into(), "r1".into());
        (r, capture)
    }

    #[test]
    fn first_respond_wins() {
        let (r, capture) = responder();
        assert!(r.respond(true, "pong"));
        assert!(!r.respond(false, "again"));
        assert!(r.has_responded());
        let sent = capture.0.lock().clone();
        assert_eq!(
            sent,
            vec![Envelope::response("r1".into(), "ping", true, Value::from("pong"))]
        );
    }

    #[test]
    fn clones_share_the_answer() {
        let (r, capture) = responder();
        let later = r.clone();
        assert!(later.respond(true, 1));
        assert!(!r.respond(true, 2));
        assert_eq!(capture.0.lock().len(), 1);
    }

    #[test]
    fn acknowledge_only_when_unanswered() {
        let (r, capture) = responder();
        assert!(r.acknowledge());
        assert!(r.respond(true, Value::Null));
        assert!(!r.acknowledge());
        let kinds: Vec<_> = capture.0.lock().iter().map(Envelope::kind).collect();
        assert_eq!(
            kinds,
            vec![ferry_core::EnvelopeKind::Ack, ferry_core::EnvelopeKind::Response]
        );
    }

    #[test]
    fn registry_keeps_order() {
        let mut reg = ListenerRegistry::new();
        let first: Arc<dyn Listener> = Arc::new(|_: &Value, r: &Responder| -> Result<(), HandlerError> {
            let _ = r.respond(true, "first");
            Ok(())
        });
        let second: Arc<dyn Listener> =
            Arc::new(|_: &Value, _: &Responder| -> Result<(), HandlerError> {
                Err(HandlerError::new("second"))
            });
        reg.register("ping", first);
        reg.register("ping", second);

        assert_eq!(reg.listener_count("ping"), 2);
        assert_eq!(reg.listener_count("other"), 0);
        assert!(reg.listeners("other").is_none());

        let (r, capture) = responder();
        let listeners = reg.listeners("ping").unwrap();
        assert!(listeners[0].handle(&Value::Null, &r).is_ok());
        assert_eq!(
            listeners[1].handle(&Value::Null, &r),
            Err(HandlerError::new("second"))
        );
        assert_eq!(capture.0.lock().len(), 1);

        reg.clear();
        assert_eq!(reg.channel_count(), 0);
    }

    #[test]
    fn handler_error_display() {
        assert_eq!(HandlerError::from("boom").to_string(), "boom");
    }
}
