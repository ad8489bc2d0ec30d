//! Subscriber bookkeeping shared by the in-process transports.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::transport::{Inbound, InboundHandler, SubscriptionId};

/// Ordered list of receive callbacks.
///
/// Delivery takes a snapshot first, so a callback may subscribe or
/// unsubscribe while it runs.
pub struct SubscriberList<S> {
    entries: Mutex<Vec<(SubscriptionId, InboundHandler<S>)>>,
    next_id: AtomicU64,
}

impl<S> SubscriberList<S> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a callback.
    pub fn add(&self, handler: InboundHandler<S>) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, handler));
        id
    }

    /// Remove a callback by id.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(sid, _)| *sid != id);
        entries.len() != before
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Invoke every callback with `message`. Returns how many ran.
    pub fn deliver(&self, message: &Inbound<S>) -> usize {
        let snapshot: Vec<InboundHandler<S>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in &snapshot {
            handler(message);
        }
        snapshot.len()
    }
}

impl<S> Default for SubscriberList<S> {
    fn default() -> Self {
        Self::new()
    }
}
