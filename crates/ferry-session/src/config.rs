//! Immutable session configuration.

use std::time::Duration;

use ferry_core::OriginPattern;
use ferry_settings::{AckExpiry, DEFAULT_LISTEN_TIMEOUT_MS, DEFAULT_TIMEOUT_MS, SessionSettings};

use crate::errors::ConfigurationError;

/// Configuration fixed at [`Session`](crate::Session) construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    send_domain: Option<String>,
    listen_domain: Vec<OriginPattern>,
    timeout: Duration,
    listen_timeout: Duration,
    ack_expiry: AckExpiry,
}

impl SessionConfig {
    /// Start a builder with default timeouts and no origins.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            send_domain: settings.send_domain.clone(),
            listen_domain: settings.listen_domain.clone(),
            timeout: settings.timeout(),
            listen_timeout: settings.listen_timeout(),
            ack_expiry: settings.ack_expiry,
        }
    }

    /// Default origin requests go to and responses must come from.
    pub fn send_domain(&self) -> Option<&str> {
        self.send_domain.as_deref()
    }

    /// Origins whose requests are answered.
    pub fn listen_domain(&self) -> &[OriginPattern] {
        &self.listen_domain
    }

    /// Response-wait window.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ack-wait window.
    pub fn listen_timeout(&self) -> Duration {
        self.listen_timeout
    }

    /// Ack-wait expiry policy.
    pub fn ack_expiry(&self) -> AckExpiry {
        self.ack_expiry
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&SessionSettings::default())
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self::from_settings(settings)
    }
}

/// Builder for [`SessionConfig`].
///
/// Pattern and origin problems are collected and reported by
/// [`build`](Self::build).
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    send_domain: Option<String>,
    listen_domain: Vec<OriginPattern>,
    timeout: Option<Duration>,
    listen_timeout: Option<Duration>,
    ack_expiry: AckExpiry,
    error: Option<ConfigurationError>,
}

impl SessionConfigBuilder {
    /// Default send origin.
    #[must_use]
    pub fn send_domain(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        if origin.is_empty() {
            self.record(ConfigurationError::EmptyOrigin);
        }
        self.send_domain = Some(origin);
        self
    }

    /// Accept requests from one more origin.
    #[must_use]
    pub fn listen_domain(mut self, origin: impl Into<OriginPattern>) -> Self {
        let origin = origin.into();
        if matches!(&origin, OriginPattern::Exact(o) if o.is_empty()) {
            self.record(ConfigurationError::EmptyOrigin);
        }
        self.listen_domain.push(origin);
        self
    }

    /// Accept requests from every origin matching `pattern` (unanchored search).
    #[must_use]
    pub fn listen_pattern(mut self, pattern: &str) -> Self {
        match OriginPattern::pattern(pattern) {
            Ok(p) => self.listen_domain.push(p),
            Err(e) => self.record(ConfigurationError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }),
        }
        self
    }

    /// Response-wait window. Zero selects the default.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Ack-wait window. Zero selects the default.
    #[must_use]
    pub fn listen_timeout(mut self, timeout: Duration) -> Self {
        self.listen_timeout = Some(timeout);
        self
    }

    /// Ack-wait expiry policy.
    #[must_use]
    pub fn ack_expiry(mut self, policy: AckExpiry) -> Self {
        self.ack_expiry = policy;
        self
    }

    /// Finish, reporting the first problem recorded.
    pub fn build(self) -> Result<SessionConfig, ConfigurationError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(SessionConfig {
            send_domain: self.send_domain,
            listen_domain: self.listen_domain,
            timeout: or_default(self.timeout, DEFAULT_TIMEOUT_MS),
            listen_timeout: or_default(self.listen_timeout, DEFAULT_LISTEN_TIMEOUT_MS),
            ack_expiry: self.ack_expiry,
        })
    }

    fn record(&mut self, err: ConfigurationError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn or_default(value: Option<Duration>, default_ms: u64) -> Duration {
    match value {
        Some(d) if !d.is_zero() => d,
        _ => Duration::from_millis(default_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn builder_defaults() {
        let config = SessionConfig::builder().build().unwrap();
        assert_eq!(config.send_domain(), None);
        assert!(config.listen_domain().is_empty());
        assert_eq!(config.timeout(), Duration::from_millis(3000));
        assert_eq!(config.listen_timeout(), Duration::from_millis(100));
        assert_eq!(config.ack_expiry(), AckExpiry::Settle);
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn builder_collects_origins() {
        let config = SessionConfig::builder()
            .send_domain("https://b.example")
            .listen_domain("https://a.example")
            .listen_pattern(r"\.trusted\.example$")
            .timeout(Duration::from_millis(50))
            .listen_timeout(Duration::from_millis(5))
            .ack_expiry(AckExpiry::Notify)
            .build()
            .unwrap();
        assert_eq!(config.send_domain(), Some("https://b.example"));
        assert_eq!(config.listen_domain().len(), 2);
        assert!(config.listen_domain()[1].matches("https://x.trusted.example"));
        assert_eq!(config.timeout(), Duration::from_millis(50));
        assert_eq!(config.listen_timeout(), Duration::from_millis(5));
        assert_eq!(config.ack_expiry(), AckExpiry::Notify);
    }

    #[test]
    fn zero_durations_use_defaults() {
        let config = SessionConfig::builder()
            .timeout(Duration::ZERO)
            .listen_timeout(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(
            config.listen_timeout(),
            Duration::from_millis(DEFAULT_LISTEN_TIMEOUT_MS)
        );
    }

    #[test]
    fn invalid_pattern_fails_build() {
        let err = SessionConfig::builder()
            .listen_pattern("(unclosed")
            .build()
            .unwrap_err();
        assert_matches!(err, ConfigurationError::InvalidPattern { pattern, .. } if pattern == "(unclosed");
    }

    #[test]
    fn empty_origins_fail_build() {
        assert_matches!(
            SessionConfig::builder().send_domain("").build(),
            Err(ConfigurationError::EmptyOrigin)
        );
        assert_matches!(
            SessionConfig::builder().listen_domain("").build(),
            Err(ConfigurationError::EmptyOrigin)
        );
    }

    #[test]
    fn from_settings_copies_everything() {
        let settings = SessionSettings {
            send_domain: Some("https://b.example".into()),
            listen_domain: vec![OriginPattern::exact("https://a.example")],
            timeout_ms: 10,
            listen_timeout_ms: 0,
            ack_expiry: AckExpiry::Notify,
        };
        let config = SessionConfig::from(&settings);
        assert_eq!(config.send_domain(), Some("https://b.example"));
        assert_eq!(config.listen_domain(), settings.listen_domain.as_slice());
        assert_eq!(config.timeout(), Duration::from_millis(10));
        assert_eq!(config.listen_timeout(), Duration::from_millis(100));
        assert_eq!(config.ack_expiry(), AckExpiry::Notify);
    }
}
