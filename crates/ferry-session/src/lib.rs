//! # ferry-session
//!
//! Correlated, acknowledged, timeout-bounded request/response exchanges over
//! an untrusted broadcast [`Transport`](ferry_transport::Transport).
//!
//! - [`Session`]: `send` / `request` / `listen` / `destroy`
//! - [`SessionConfig`]: send origin, listen origins, timeouts, ack-expiry policy
//! - [`CorrelationTable`](correlation::CorrelationTable): pending requests and their timers
//! - [`ListenerRegistry`](listeners::ListenerRegistry) and [`Responder`]: single-answer fan-out
//! - [`OriginGuard`](guard::OriginGuard): origin authorization
//!
//! A request moves `Sent` → `Acknowledged` → settled, or straight from `Sent`
//! to settled. It settles on the first matching response from its target
//! origin, on the response-wait timeout, or (under [`AckExpiry::Settle`]) on
//! the ack-wait timeout.

#![deny(unsafe_code)]

pub mod config;
pub mod correlation;
mod dispatcher;
pub mod errors;
pub mod guard;
pub mod listeners;
pub mod session;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use correlation::PendingState;
pub use errors::{ConfigurationError, Result, SessionError};
pub use ferry_settings::AckExpiry;
pub use listeners::{HandlerError, Listener, Responder};
pub use session::{Reply, SendRequest, Session};
