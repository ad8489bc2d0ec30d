//! The raw transport boundary.

use std::fmt;
use std::sync::Arc;

use crate::errors::TransportError;

/// Target origin that lets a transmit reach a context of any origin.
pub const WILDCARD_ORIGIN: &str = "*";

/// One message as seen by a receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inbound<S> {
    /// Raw text exactly as transmitted.
    pub text: String,
    /// Sender's origin, attached by the transport.
    pub origin: String,
    /// Handle that can be passed back to [`Transport::transmit`] to reach the sender.
    pub source: S,
}

/// Receive callback registered with [`Transport::subscribe`].
pub type InboundHandler<S> = Arc<dyn Fn(&Inbound<S>) + Send + Sync>;

/// Identifies one subscription on one transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a raw subscription number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw subscription number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A one-way, unreliable broadcast transport.
///
/// `transmit` hands text to the transport addressed to `target`; the
/// transport delivers it only if the target's origin matches
/// `target_origin` (or `target_origin` is [`WILDCARD_ORIGIN`]). Every
/// subscriber sees every message delivered to this endpoint.
pub trait Transport: Send + Sync + 'static {
    /// Handle naming a context that can receive messages.
    type Target: Clone + fmt::Debug + Send + Sync + 'static;

    /// Hand `text` to the transport. `Ok` does not imply delivery.
    fn transmit(
        &self,
        target: &Self::Target,
        text: &str,
        target_origin: &str,
    ) -> Result<(), TransportError>;

    /// Register a receive callback.
    fn subscribe(&self, handler: InboundHandler<Self::Target>) -> SubscriptionId;

    /// Remove a receive callback. Returns `false` if it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

impl<T: Transport> Transport for Arc<T> {
    type Target = T::Target;

    fn transmit(
        &self,
        target: &Self::Target,
        text: &str,
        target_origin: &str,
    ) -> Result<(), TransportError> {
        (**self).transmit(target, text, target_origin)
    }

    fn subscribe(&self, handler: InboundHandler<Self::Target>) -> SubscriptionId {
        (**self).subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        (**self).unsubscribe(id)
    }
}

/// Whether a message addressed with `target_origin` may reach a context whose
/// origin is `actual`.
pub fn origin_admits(target_origin: &str, actual: &str) -> bool {
    target_origin == WILDCARD_ORIGIN || target_origin == actual
}
