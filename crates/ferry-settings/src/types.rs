//! Settings types.

use std::time::Duration;

use ferry_core::OriginPattern;
use ferry_core::origin::one_or_many;
use serde::{Deserialize, Serialize};

/// Default response-wait window in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Default ack-wait window in milliseconds.
pub const DEFAULT_LISTEN_TIMEOUT_MS: u64 = 100;

/// Root settings document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FerrySettings {
    /// Protocol session settings.
    pub session: SessionSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// What happens to a pending request when its ack-wait window elapses
/// without an acknowledgement.
///
/// Both policies report `(false, "No listener")` to the requester.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckExpiry {
    /// The request settles: its response-wait timer is cancelled and the
    /// record removed, so the callback runs at most once.
    #[default]
    Settle,
    /// The notice is advisory: the record stays pending and a late response
    /// or the response-wait timeout invokes the callback again.
    Notify,
}

/// Settings for one protocol session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Default origin that requests are addressed to and responses must
    /// come from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_domain: Option<String>,
    /// Origins whose requests this session answers. A single entry or a list.
    #[serde(deserialize_with = "one_or_many")]
    pub listen_domain: Vec<OriginPattern>,
    /// Response-wait window in milliseconds. `0` selects the default.
    pub timeout_ms: u64,
    /// Ack-wait window in milliseconds. `0` selects the default.
    pub listen_timeout_ms: u64,
    /// Ack-wait expiry policy.
    pub ack_expiry: AckExpiry,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            send_domain: None,
            listen_domain: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            listen_timeout_ms: DEFAULT_LISTEN_TIMEOUT_MS,
            ack_expiry: AckExpiry::default(),
        }
    }
}

impl SessionSettings {
    /// Response-wait window.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.timeout_ms, DEFAULT_TIMEOUT_MS))
    }

    /// Ack-wait window.
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_millis(non_zero_or(
            self.listen_timeout_ms,
            DEFAULT_LISTEN_TIMEOUT_MS,
        ))
    }
}

fn non_zero_or(value: u64, default: u64) -> u64 {
    if value == 0 { default } else { value }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
