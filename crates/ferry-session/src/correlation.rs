//! Outstanding requests, keyed by channel and id.
//!
//! The table owns every pending record and the cancellation tokens of its
//! two timers. All transitions are plain methods on `&mut self`; the session
//! calls them under its state lock and runs the returned callbacks after
//! releasing it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use ferry_core::RequestId;
use ferry_settings::AckExpiry;
use parking_lot::ReentrantMutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Completion callback, invoked with `(success, data)`.
pub type Callback = Box<dyn FnMut(bool, Value) + Send>;

/// Callback shared between the table and whoever invokes it.
///
/// The reentrant lock serialises completions from different threads; the
/// `RefCell` detects a callback re-entering itself on the same thread.
pub type SharedCallback = Arc<ReentrantMutex<RefCell<Callback>>>;

/// Share a completion callback.
pub fn shared_callback(callback: Callback) -> SharedCallback {
    Arc::new(ReentrantMutex::new(RefCell::new(callback)))
}

/// Run a shared callback.
///
/// Completions racing in from other threads wait their turn. A callback that
/// synchronously triggers its own re-invocation would recurse into itself;
/// the nested completion is dropped instead.
pub fn invoke(callback: &SharedCallback, success: bool, data: Value) {
    let guard = callback.lock();
    match guard.try_borrow_mut() {
        Ok(mut slot) => {
            let f: &mut (dyn FnMut(bool, Value) + Send) = &mut **slot;
            f(success, data);
        }
        Err(_) => warn!("completion callback re-entered, nested completion dropped"),
    }
}

/// Where a pending request stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingState {
    /// Sent, nothing heard back.
    Sent,
    /// A listener acknowledged; waiting for the response.
    Acknowledged,
}

/// One in-flight request.
pub struct PendingRequest {
    /// Origin the response must come from.
    pub target_domain: String,
    /// Current state.
    pub state: PendingState,
    /// Distinguishes this record from an earlier one that reused its id.
    pub serial: u64,
    /// Completion callback.
    pub callback: SharedCallback,
    /// Cancels the ack-wait timer.
    pub ack_timer: CancellationToken,
    /// Cancels the response-wait timer.
    pub response_timer: CancellationToken,
}

impl PendingRequest {
    fn cancel_timers(&self) {
        self.ack_timer.cancel();
        self.response_timer.cancel();
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("target_domain", &self.target_domain)
            .field("state", &self.state)
            .field("serial", &self.serial)
            .finish_non_exhaustive()
    }
}

/// Result of an ack-wait expiry.
pub enum AckExpired {
    /// The record was settled and removed.
    Settled(PendingRequest),
    /// The record stays pending; the callback is notified only.
    Notified(SharedCallback),
}

impl std::fmt::Debug for AckExpired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Settled(record) => f.debug_tuple("Settled").field(record).finish(),
            Self::Notified(_) => f.write_str("Notified"),
        }
    }
}

/// Pending requests grouped by channel.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    channels: HashMap<String, HashMap<RequestId, PendingRequest>>,
    next_serial: u64,
}

impl CorrelationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a serial for a new record.
    pub fn next_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    /// Whether `id` is outstanding on `channel`.
    pub fn contains(&self, channel: &str, id: &RequestId) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|group| group.contains_key(id))
    }

    /// Whether any pending request targets `origin`.
    pub fn has_target(&self, origin: &str) -> bool {
        self.channels
            .values()
            .flat_map(HashMap::values)
            .any(|r| r.target_domain == origin)
    }

    /// Add a record. The caller guarantees `id` is not outstanding on `channel`.
    pub fn insert(&mut self, channel: &str, id: RequestId, record: PendingRequest) {
        let group = self.channels.entry(channel.to_string()).or_default();
        if let Some(previous) = group.insert(id, record) {
            previous.cancel_timers();
        }
    }

    /// Apply an `ack` from `origin`. Returns `false` if nothing matched.
    ///
    /// Only a record still in `Sent` advances; its ack-wait timer is cancelled.
    pub fn acknowledge(&mut self, channel: &str, id: &RequestId, origin: &str) -> bool {
        let Some(record) = self.get_mut(channel, id) else {
            return false;
        };
        if record.target_domain != origin || record.state != PendingState::Sent {
            return false;
        }
        record.ack_timer.cancel();
        record.state = PendingState::Acknowledged;
        true
    }

    /// Apply a `response` from `origin`, removing and returning the record.
    pub fn take_response(
        &mut self,
        channel: &str,
        id: &RequestId,
        origin: &str,
    ) -> Option<PendingRequest> {
        let matches = self
            .get_mut(channel, id)
            .is_some_and(|r| r.target_domain == origin);
        if !matches {
            return None;
        }
        let record = self.remove(channel, id)?;
        record.cancel_timers();
        Some(record)
    }

    /// The ack-wait timer armed for `serial` fired.
    pub fn expire_ack(
        &mut self,
        channel: &str,
        id: &RequestId,
        serial: u64,
        policy: AckExpiry,
    ) -> Option<AckExpired> {
        let record = self.get_mut(channel, id)?;
        if record.serial != serial || record.state != PendingState::Sent {
            return None;
        }
        match policy {
            AckExpiry::Notify => Some(AckExpired::Notified(record.callback.clone())),
            AckExpiry::Settle => {
                let record = self.remove(channel, id)?;
                record.cancel_timers();
                Some(AckExpired::Settled(record))
            }
        }
    }

    /// The response-wait timer armed for `serial` fired.
    pub fn expire_response(
        &mut self,
        channel: &str,
        id: &RequestId,
        serial: u64,
    ) -> Option<PendingRequest> {
        if self.get_mut(channel, id)?.serial != serial {
            return None;
        }
        let record = self.remove(channel, id)?;
        record.cancel_timers();
        Some(record)
    }

    /// Remove every record, cancelling its timers without running callbacks.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        let records: Vec<PendingRequest> = self
            .channels
            .drain()
            .flat_map(|(_, group)| group.into_values())
            .collect();
        for record in &records {
            record.cancel_timers();
        }
        records
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.channels.values().map(HashMap::len).sum()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of channels with at least one pending request.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// State of one record.
    pub fn state(&self, channel: &str, id: &RequestId) -> Option<PendingState> {
        self.channels.get(channel)?.get(id).map(|r| r.state)
    }

    fn get_mut(&mut self, channel: &str, id: &RequestId) -> Option<&mut PendingRequest> {
        self.channels.get_mut(channel)?.get_mut(id)
    }

    fn remove(&mut self, channel: &str, id: &RequestId) -> Option<PendingRequest> {
        let group = self.channels.get_mut(channel)?;
        let record = group.remove(id);
        if group.is_empty() {
            let _ = self.channels.remove(channel);
        }
        record
    }
}
