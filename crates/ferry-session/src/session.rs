//! The public session handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use ferry_core::{Envelope, RequestId, codec};
use ferry_transport::{Inbound, SubscriptionId, Transport};
use metrics::counter;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::correlation::{
    AckExpired, Callback, CorrelationTable, PendingRequest, PendingState, invoke,
    shared_callback,
};
use crate::dispatcher::count_settled;
use crate::errors::{ConfigurationError, Result, SessionError};
use crate::guard::OriginGuard;
use crate::listeners::{HandlerError, Listener, ListenerRegistry, Responder};

/// Outcome of a completed request.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    /// Whether the exchange succeeded.
    pub success: bool,
    /// Response payload, or the failure reason.
    pub data: Value,
}

impl Reply {
    /// `Ok(data)` on success, `Err(data)` otherwise.
    pub fn into_result(self) -> std::result::Result<Value, Value> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.data)
        }
    }
}

/// One outbound request, built before handing it to [`Session::send`].
pub struct SendRequest<S> {
    target: S,
    channel: String,
    data: Value,
    domain: Option<String>,
    callback: Option<Callback>,
}

impl<S> SendRequest<S> {
    /// Request `channel` on `target` with `data`.
    pub fn new(target: S, channel: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            target,
            channel: channel.into(),
            data: data.into(),
            domain: None,
            callback: None,
        }
    }

    /// Origin the target must have. Overrides the session default; an empty
    /// string falls back to it.
    #[must_use]
    pub fn domain(mut self, origin: impl Into<String>) -> Self {
        self.domain = Some(origin.into());
        self
    }

    /// Completion callback, invoked with `(success, data)`.
    ///
    /// Without one the request is fire-and-forget: nothing is tracked and
    /// any reply is ignored.
    #[must_use]
    pub fn on_reply(mut self, callback: impl FnMut(bool, Value) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl<S: fmt::Debug> fmt::Debug for SendRequest<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendRequest")
            .field("target", &self.target)
            .field("channel", &self.channel)
            .field("domain", &self.domain)
            .field("tracked", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) pending: CorrelationTable,
    pub(crate) listeners: ListenerRegistry,
}

pub(crate) struct SessionInner<T: Transport> {
    pub(crate) transport: Arc<T>,
    pub(crate) config: SessionConfig,
    pub(crate) guard: OriginGuard,
    pub(crate) state: Mutex<SessionState>,
    subscription: Mutex<Option<SubscriptionId>>,
    shutdown: CancellationToken,
    destroyed: AtomicBool,
}

impl<T: Transport> SessionInner<T> {
    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_subscribed(self: &Arc<Self>) -> Result<()> {
        let mut slot = self.subscription.lock();
        if self.is_destroyed() {
            return Err(SessionError::Destroyed);
        }
        if slot.is_none() {
            let weak = Arc::downgrade(self);
            let id = self
                .transport
                .subscribe(Arc::new(move |inbound: &Inbound<T::Target>| {
                    if let Some(inner) = weak.upgrade() {
                        inner.dispatch(inbound);
                    }
                }));
            debug!(subscription = %id, "subscribed to transport");
            *slot = Some(id);
        }
        Ok(())
    }

    fn on_timer(&self, kind: TimerKind, key: &TimerKey) {
        match kind {
            TimerKind::Ack => {
                let expired = self.state.lock().pending.expire_ack(
                    &key.channel,
                    &key.id,
                    key.serial,
                    self.config.ack_expiry(),
                );
                let callback = match expired {
                    Some(AckExpired::Settled(record)) => {
                        count_settled("no_listener");
                        record.callback
                    }
                    Some(AckExpired::Notified(callback)) => callback,
                    None => return,
                };
                debug!(channel = %key.channel, request_id = %key.id, "no listener acknowledged");
                invoke(&callback, false, Value::from(ferry_core::reasons::NO_LISTENER));
            }
            TimerKind::Response => {
                let expired =
                    self.state
                        .lock()
                        .pending
                        .expire_response(&key.channel, &key.id, key.serial);
                if let Some(record) = expired {
                    count_settled("timeout");
                    debug!(channel = %key.channel, request_id = %key.id, "request timed out");
                    invoke(&record.callback, false, Value::from(ferry_core::reasons::TIMEOUT));
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum TimerKind {
    Ack,
    Response,
}

#[derive(Clone, Debug)]
struct TimerKey {
    channel: String,
    id: RequestId,
    serial: u64,
}

fn arm_timer<T: Transport>(
    runtime: &Handle,
    session: Weak<SessionInner<T>>,
    kind: TimerKind,
    token: CancellationToken,
    delay: Duration,
    key: TimerKey,
) {
    let _ = runtime.spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = tokio::time::sleep(delay) => {
                if let Some(inner) = session.upgrade() {
                    inner.on_timer(kind, &key);
                }
            }
        }
    });
}

/// A request/response endpoint bound to one transport.
///
/// The session subscribes to the transport lazily, on the first `send` or
/// `listen`, and unsubscribes on [`destroy`](Self::destroy) or drop.
/// Requests with a completion arm their timers on the ambient tokio runtime.
pub struct Session<T: Transport> {
    inner: Arc<SessionInner<T>>,
}

impl<T: Transport> Session<T> {
    /// Create a session over `transport`.
    pub fn new(transport: Arc<T>, config: SessionConfig) -> Self {
        let guard = OriginGuard::new(
            config.send_domain().map(str::to_owned),
            config.listen_domain().to_vec(),
        );
        Self {
            inner: Arc::new(SessionInner {
                transport,
                config,
                guard,
                state: Mutex::new(SessionState::default()),
                subscription: Mutex::new(None),
                shutdown: CancellationToken::new(),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Send a request and return its id.
    ///
    /// With a completion callback the request is tracked: the callback runs
    /// with the response, with `(false, "No listener")` if nobody acknowledges
    /// within the ack-wait window, or with `(false, "Timeout")` if no response
    /// arrives within the response-wait window.
    pub fn send(&self, request: SendRequest<T::Target>) -> Result<RequestId> {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return Err(SessionError::Destroyed);
        }
        let SendRequest {
            target,
            channel,
            data,
            domain,
            callback,
        } = request;

        let domain = domain
            .filter(|d| !d.is_empty())
            .or_else(|| inner.config.send_domain().map(str::to_owned))
            .ok_or(ConfigurationError::MissingSendDomain)?;
        let runtime = if callback.is_some() {
            Some(Handle::try_current().map_err(|_| SessionError::NoRuntime)?)
        } else {
            None
        };
        inner.ensure_subscribed()?;

        let (id, text, timers) = {
            let mut state = inner.state.lock();
            if inner.is_destroyed() {
                return Err(SessionError::Destroyed);
            }
            let mut id = RequestId::generate();
            while state.pending.contains(&channel, &id) {
                id = RequestId::generate();
            }
            let text = codec::encode(&Envelope::message(id.clone(), channel.clone(), data))?;

            let timers = match (callback, runtime) {
                (Some(callback), Some(runtime)) => {
                    let serial = state.pending.next_serial();
                    let ack_timer = inner.shutdown.child_token();
                    let response_timer = inner.shutdown.child_token();
                    state.pending.insert(
                        &channel,
                        id.clone(),
                        PendingRequest {
                            target_domain: domain.clone(),
                            state: PendingState::Sent,
                            serial,
                            callback: shared_callback(callback),
                            ack_timer: ack_timer.clone(),
                            response_timer: response_timer.clone(),
                        },
                    );
                    Some((runtime, serial, ack_timer, response_timer))
                }
                _ => None,
            };
            (id, text, timers)
        };

        if let Some((runtime, serial, ack_timer, response_timer)) = timers {
            let key = TimerKey {
                channel: channel.clone(),
                id: id.clone(),
                serial,
            };
            arm_timer(
                &runtime,
                Arc::downgrade(inner),
                TimerKind::Ack,
                ack_timer,
                inner.config.listen_timeout(),
                key.clone(),
            );
            arm_timer(
                &runtime,
                Arc::downgrade(inner),
                TimerKind::Response,
                response_timer,
                inner.config.timeout(),
                key,
            );
        }

        counter!("ferry_requests_sent_total").increment(1);
        debug!(channel = %channel, request_id = %id, target_origin = %domain, "request sent");
        if let Err(error) = inner.transport.transmit(&target, &text, &domain) {
            warn!(channel = %channel, request_id = %id, %error, "transmit failed");
        }
        Ok(id)
    }

    /// Send a request and wait for its first completion.
    ///
    /// A callback already set on `request` still runs before the future
    /// resolves. Fails with [`SessionError::Abandoned`] if the session is
    /// destroyed first.
    pub async fn request(&self, mut request: SendRequest<T::Target>) -> Result<Reply> {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let mut user = request.callback.take();
        request.callback = Some(Box::new(move |success: bool, data: Value| {
            if let Some(callback) = user.as_mut() {
                callback(success, data.clone());
            }
            if let Some(tx) = tx.take() {
                let _ = tx.send(Reply { success, data });
            }
        }));
        let _ = self.send(request)?;
        rx.await.map_err(|_| SessionError::Abandoned)
    }

    /// Answer requests on `channel` from accepted listen origins.
    ///
    /// Listeners on one channel run in registration order. The first
    /// `respond` wins; a listener that returns `Err` or panics counts as
    /// `respond(false, "Unknown Error")`.
    pub fn listen<F>(&self, channel: &str, handler: F) -> Result<()>
    where
        F: Fn(&Value, &Responder) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.add_listener(channel, Arc::new(handler))
    }

    /// [`listen`](Self::listen) with a [`Listener`] implementation.
    pub fn add_listener(&self, channel: &str, listener: Arc<dyn Listener>) -> Result<()> {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return Err(SessionError::Destroyed);
        }
        if !inner.guard.can_listen() {
            return Err(ConfigurationError::MissingListenDomain.into());
        }
        inner.ensure_subscribed()?;
        let mut state = inner.state.lock();
        if inner.is_destroyed() {
            return Err(SessionError::Destroyed);
        }
        state.listeners.register(channel, listener);
        debug!(channel, listeners = state.listeners.listener_count(channel), "listener registered");
        Ok(())
    }

    /// Unsubscribe, cancel every timer without running callbacks, and drop
    /// all pending requests and listeners. Idempotent.
    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        inner.shutdown.cancel();

        let subscription = inner.subscription.lock().take();
        if let Some(id) = subscription {
            let _ = inner.transport.unsubscribe(id);
        }

        let (pending, channels) = {
            let mut state = inner.state.lock();
            let channels = state.listeners.channel_count();
            state.listeners.clear();
            (state.pending.drain(), channels)
        };
        debug!(
            pending = pending.len(),
            listener_channels = channels,
            "session destroyed"
        );
        drop(pending);
    }

    /// Whether [`destroy`](Self::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// Whether the session holds a transport subscription.
    pub fn is_subscribed(&self) -> bool {
        self.inner.subscription.lock().is_some()
    }

    /// Number of tracked requests still waiting.
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// State of one tracked request.
    pub fn pending_state(&self, channel: &str, id: &RequestId) -> Option<PendingState> {
        self.inner.state.lock().pending.state(channel, id)
    }

    /// Number of listeners on `channel`.
    pub fn listener_count(&self, channel: &str) -> usize {
        self.inner.state.lock().listeners.listener_count(channel)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}
