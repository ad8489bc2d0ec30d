//! In-process broadcast hub.
//!
//! A [`LocalBus`] holds a set of contexts, each opened with a fixed origin.
//! Transmitting to a context pushes the text onto that context's bounded
//! queue; a per-context pump task drains the queue in order and runs the
//! context's subscribers. The bus stamps every message with the sender's
//! origin, so a context cannot claim to be someone else.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::errors::TransportError;
use crate::subscribers::SubscriberList;
use crate::transport::{Inbound, InboundHandler, SubscriptionId, Transport, origin_admits};

/// Queue depth per context.
pub const CONTEXT_QUEUE_CAPACITY: usize = 256;

/// Opaque handle naming one context on a [`LocalBus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextHandle(u64);

impl fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

struct Mailbox {
    origin: String,
    tx: mpsc::Sender<Inbound<ContextHandle>>,
    dropped: AtomicU64,
}

struct BusInner {
    mailboxes: RwLock<HashMap<ContextHandle, Arc<Mailbox>>>,
    next_id: AtomicU64,
}

/// Registry of in-process contexts.
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<BusInner>,
}

impl LocalBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                mailboxes: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Open a context with the given origin.
    ///
    /// Spawns the context's pump task, so this must run inside a tokio runtime.
    pub fn open(&self, origin: impl Into<String>) -> Arc<LocalContext> {
        let origin = origin.into();
        let handle = ContextHandle(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(CONTEXT_QUEUE_CAPACITY);
        let subscribers = Arc::new(SubscriberList::new());
        let pump = tokio::spawn(pump(handle, rx, subscribers.clone()));

        let mailbox = Arc::new(Mailbox {
            origin: origin.clone(),
            tx,
            dropped: AtomicU64::new(0),
        });
        let _ = self.inner.mailboxes.write().insert(handle, mailbox);
        debug!(context = %handle, origin = %origin, "context opened");

        Arc::new(LocalContext {
            handle,
            origin,
            bus: self.inner.clone(),
            subscribers,
            pump,
        })
    }

    /// Number of open contexts.
    pub fn context_count(&self) -> usize {
        self.inner.mailboxes.read().len()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

async fn pump(
    handle: ContextHandle,
    mut rx: mpsc::Receiver<Inbound<ContextHandle>>,
    subscribers: Arc<SubscriberList<ContextHandle>>,
) {
    while let Some(message) = rx.recv().await {
        let delivered = subscribers.deliver(&message);
        trace!(context = %handle, origin = %message.origin, delivered, "context delivery");
    }
    debug!(context = %handle, "context queue closed");
}

/// One context on a [`LocalBus`]. Closing happens on drop.
pub struct LocalContext {
    handle: ContextHandle,
    origin: String,
    bus: Arc<BusInner>,
    subscribers: Arc<SubscriberList<ContextHandle>>,
    pump: JoinHandle<()>,
}

impl LocalContext {
    /// Handle other contexts use to address this one.
    pub fn handle(&self) -> ContextHandle {
        self.handle
    }

    /// This context's origin.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Messages dropped because this context's queue was full.
    pub fn drop_count(&self) -> u64 {
        self.bus
            .mailboxes
            .read()
            .get(&self.handle)
            .map_or(0, |mailbox| mailbox.dropped.load(Ordering::Relaxed))
    }
}

impl fmt::Debug for LocalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalContext")
            .field("handle", &self.handle)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl Transport for LocalContext {
    type Target = ContextHandle;

    fn transmit(
        &self,
        target: &ContextHandle,
        text: &str,
        target_origin: &str,
    ) -> Result<(), TransportError> {
        let mailbox = self
            .bus
            .mailboxes
            .read()
            .get(target)
            .cloned()
            .ok_or_else(|| TransportError::UnknownTarget(target.to_string()))?;

        if !origin_admits(target_origin, &mailbox.origin) {
            // Mismatched target origin is a silent drop, not an error.
            debug!(
                from = %self.handle,
                to = %target,
                target_origin,
                actual = %mailbox.origin,
                "target origin mismatch, message dropped"
            );
            return Ok(());
        }

        let message = Inbound {
            text: text.to_string(),
            origin: self.origin.clone(),
            source: self.handle,
        };
        match mailbox.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = mailbox.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(to = %target, "context queue full, message dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(TransportError::Closed(target.to_string()))
            }
        }
    }

    fn subscribe(&self, handler: InboundHandler<ContextHandle>) -> SubscriptionId {
        self.subscribers.add(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }
}

impl Drop for LocalContext {
    fn drop(&mut self) {
        let _ = self.bus.mailboxes.write().remove(&self.handle);
        self.pump.abort();
        debug!(context = %self.handle, "context closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn recorder(ctx: &LocalContext) -> Arc<Mutex<Vec<Inbound<ContextHandle>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _ = ctx.subscribe(Arc::new(move |m: &Inbound<ContextHandle>| {
            sink.lock().push(m.clone());
        }));
        seen
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test]
    async fn delivers_with_sender_origin() {
        let bus = LocalBus::new();
        let a = bus.open("https://a.example");
        let b = bus.open("https://b.example");
        let seen = recorder(&b);

        a.transmit(&b.handle(), "hello", "https://b.example").unwrap();
        settle().await;

        let seen = seen.lock().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].text, "hello");
        assert_eq!(seen[0].origin, "https://a.example");
        assert_eq!(seen[0].source, a.handle());
    }

    #[tokio::test]
    async fn wildcard_target_origin_delivers() {
        let bus = LocalBus::new();
        let a = bus.open("https://a.example");
        let b = bus.open("https://b.example");
        let seen = recorder(&b);

        a.transmit(&b.handle(), "x", "*").unwrap();
        settle().await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn mismatched_target_origin_is_silently_dropped() {
        let bus = LocalBus::new();
        let a = bus.open("https://a.example");
        let b = bus.open("https://b.example");
        let seen = recorder(&b);

        a.transmit(&b.handle(), "x", "https://evil.example").unwrap();
        settle().await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn delivery_preserves_order() {
        let bus = LocalBus::new();
        let a = bus.open("https://a.example");
        let b = bus.open("https://b.example");
        let seen = recorder(&b);

        for i in 0..5 {
            a.transmit(&b.handle(), &i.to_string(), "*").unwrap();
        }
        settle().await;
        let texts: Vec<String> = seen.lock().iter().map(|m| m.text.clone()).collect();
        assert_eq!(texts, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn closed_context_is_unknown() {
        let bus = LocalBus::new();
        let a = bus.open("https://a.example");
        let b = bus.open("https://b.example");
        let target = b.handle();
        assert_eq!(bus.context_count(), 2);

        drop(b);
        assert_eq!(bus.context_count(), 1);
        let err = a.transmit(&target, "x", "*").unwrap_err();
        assert_matches!(err, TransportError::UnknownTarget(_));
    }

    #[tokio::test]
    async fn context_can_message_itself() {
        let bus = LocalBus::new();
        let a = bus.open("https://a.example");
        let seen = recorder(&a);
        a.transmit(&a.handle(), "loop", "https://a.example").unwrap();
        settle().await;
        assert_eq!(seen.lock()[0].origin, "https://a.example");
    }

    #[tokio::test]
    async fn full_queue_counts_drops() {
        let bus = LocalBus::new();
        let a = bus.open("https://a.example");
        let b = bus.open("https://b.example");

        // Current-thread runtime: the pump cannot run until we yield.
        for _ in 0..CONTEXT_QUEUE_CAPACITY + 3 {
            a.transmit(&b.handle(), "x", "*").unwrap();
        }
        assert_eq!(b.drop_count(), 3);
        assert_eq!(a.drop_count(), 0);
    }
}
