//! # ferry
//!
//! Correlated request/response exchanges between contexts that can only
//! broadcast text at each other, such as an embedding page and its frames.
//!
//! ```ignore
//! let bus = LocalBus::new();
//! let parent = bus.open("https://a.example");
//! let frame = bus.open("https://b.example");
//!
//! let listener = Session::new(frame.clone(), SessionConfig::builder()
//!     .listen_domain("https://a.example")
//!     .build()?);
//! listener.listen("ping", |_, respond| {
//!     let _ = respond.respond(true, "pong");
//!     Ok(())
//! })?;
//!
//! let requester = Session::new(parent.clone(), SessionConfig::builder()
//!     .send_domain("https://b.example")
//!     .build()?);
//! let reply = requester.request(SendRequest::new(frame.handle(), "ping", "x")).await?;
//! ```

#![deny(unsafe_code)]

use std::sync::Arc;

pub use ferry_core::{CodecError, Envelope, EnvelopeKind, OriginPattern, RequestId, codec, reasons};
pub use ferry_session::{
    AckExpiry, ConfigurationError, HandlerError, Listener, PendingState, Reply, Responder,
    SendRequest, Session, SessionConfig, SessionConfigBuilder, SessionError,
};
pub use ferry_settings::{FerrySettings, SessionSettings, SettingsError};
pub use ferry_transport::{
    ContextHandle, Inbound, LocalBus, LocalContext, MemoryTransport, Outbound, PeerId,
    SubscriptionId, Transport, TransportError,
};

/// Install the stderr log subscriber at the configured level.
pub fn init_logging(settings: &FerrySettings) {
    ferry_core::logging::init_subscriber(&settings.logging.level);
}

/// Build a session over `transport` from loaded settings.
pub fn session_from_settings<T: Transport>(
    transport: Arc<T>,
    settings: &FerrySettings,
) -> Session<T> {
    let config = SessionConfig::from_settings(&settings.session);
    tracing::debug!(
        send_domain = config.send_domain().unwrap_or("-"),
        listen_domains = config.listen_domain().len(),
        ack_expiry = ?config.ack_expiry(),
        "session configured from settings"
    );
    Session::new(transport, config)
}

/// Load settings from `~/.ferry/settings.json` and the environment, install
/// logging, and build a session over `transport`.
pub fn session_from_env<T: Transport>(transport: Arc<T>) -> Result<Session<T>, SettingsError> {
    let settings = ferry_settings::load_settings()?;
    init_logging(&settings);
    Ok(session_from_settings(transport, &settings))
}
