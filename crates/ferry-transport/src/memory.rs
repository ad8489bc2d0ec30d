//! Recording transport for tests and embedders.
//!
//! [`MemoryTransport`] never delivers anything on its own. Every `transmit`
//! is recorded as an [`Outbound`], and the embedder pushes inbound traffic
//! through [`MemoryTransport::deliver`], which runs all subscribers
//! synchronously on the caller's thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::errors::TransportError;
use crate::subscribers::SubscriberList;
use crate::transport::{Inbound, InboundHandler, SubscriptionId, Transport};

/// Named peer handle used as the target type of [`MemoryTransport`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer handle.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Peer name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One recorded `transmit` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    /// Addressed peer.
    pub target: PeerId,
    /// Raw text handed to the transport.
    pub text: String,
    /// Origin the sender required the target to have.
    pub target_origin: String,
}

/// A transport that records what it is asked to send.
pub struct MemoryTransport {
    outbound: Mutex<Vec<Outbound>>,
    subscribers: SubscriberList<PeerId>,
    rejecting: AtomicBool,
}

impl MemoryTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self {
            outbound: Mutex::new(Vec::new()),
            subscribers: SubscriberList::new(),
            rejecting: AtomicBool::new(false),
        }
    }

    /// Copy of every recorded transmit, oldest first.
    pub fn outbound(&self) -> Vec<Outbound> {
        self.outbound.lock().clone()
    }

    /// Drain the recorded transmits.
    pub fn take_outbound(&self) -> Vec<Outbound> {
        std::mem::take(&mut *self.outbound.lock())
    }

    /// Number of recorded transmits.
    pub fn outbound_count(&self) -> usize {
        self.outbound.lock().len()
    }

    /// Make every later `transmit` fail with [`TransportError::Rejected`].
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `text` to all subscribers as if `source` at `origin` sent it.
    ///
    /// Returns how many subscribers ran.
    pub fn deliver(&self, text: impl Into<String>, origin: &str, source: impl Into<PeerId>) -> usize {
        let message = Inbound {
            text: text.into(),
            origin: origin.to_string(),
            source: source.into(),
        };
        trace!(origin, source = %message.source, "memory transport deliver");
        self.subscribers.deliver(&message)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    type Target = PeerId;

    fn transmit(
        &self,
        target: &PeerId,
        text: &str,
        target_origin: &str,
    ) -> Result<(), TransportError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(format!("peer {target} unreachable")));
        }
        self.outbound.lock().push(Outbound {
            target: target.clone(),
            text: text.to_string(),
            target_origin: target_origin.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self, handler: InboundHandler<PeerId>) -> SubscriptionId {
        self.subscribers.add(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[test]
    fn transmit_is_recorded() {
        let t = MemoryTransport::new();
        t.transmit(&PeerId::new("frame"), "hello", "https://b.example")
            .unwrap();
        let out = t.outbound();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target.as_str(), "frame");
        assert_eq!(out[0].text, "hello");
        assert_eq!(out[0].target_origin, "https://b.example");
    }

    #[test]
    fn take_outbound_drains() {
        let t = MemoryTransport::new();
        t.transmit(&"a".into(), "1", "*").unwrap();
        t.transmit(&"a".into(), "2", "*").unwrap();
        assert_eq!(t.take_outbound().len(), 2);
        assert_eq!(t.outbound_count(), 0);
    }

    #[test]
    fn rejecting_transport_fails_and_records_nothing() {
        let t = MemoryTransport::new();
        t.set_rejecting(true);
        let err = t.transmit(&"a".into(), "1", "*").unwrap_err();
        assert_matches!(err, TransportError::Rejected(_));
        assert_eq!(t.outbound_count(), 0);
    }

    #[test]
    fn deliver_passes_origin_and_source() {
        let t = MemoryTransport::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = t.subscribe(Arc::new(move |m: &Inbound<PeerId>| {
            sink.lock().push(m.clone());
        }));
        assert_eq!(t.deliver("hi", "https://a.example", "parent"), 1);
        let seen = seen.lock().clone();
        assert_eq!(seen[0].text, "hi");
        assert_eq!(seen[0].origin, "https://a.example");
        assert_eq!(seen[0].source, PeerId::new("parent"));

        assert!(t.unsubscribe(id));
        assert_eq!(t.deliver("again", "https://a.example", "parent"), 0);
    }
}
