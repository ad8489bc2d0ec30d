//! Session error types.

use ferry_core::CodecError;
use thiserror::Error;

/// The session is missing configuration an operation needs.
///
/// Always surfaced to the caller synchronously.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// `send` without an explicit domain on a session with no default.
    #[error("no send domain: pass one with the request or configure a default")]
    MissingSendDomain,

    /// `listen` on a session with no accepted listen origins.
    #[error("no listen domain configured")]
    MissingListenDomain,

    /// A listen-origin pattern failed to compile.
    #[error("invalid origin pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Pattern source as written.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// An origin string is empty.
    #[error("origin must not be empty")]
    EmptyOrigin,
}

/// Errors returned by [`Session`](crate::Session) operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// See [`ConfigurationError`].
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The session has been destroyed.
    #[error("session destroyed")]
    Destroyed,

    /// A request with a completion needs a tokio runtime for its timers.
    #[error("no tokio runtime available for request timers")]
    NoRuntime,

    /// The session went away before the request completed.
    #[error("request abandoned before completion")]
    Abandoned,

    /// The outbound envelope could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn configuration_error_converts() {
        let err: SessionError = ConfigurationError::MissingSendDomain.into();
        assert_matches!(
            err,
            SessionError::Configuration(ConfigurationError::MissingSendDomain)
        );
    }

    #[test]
    fn configuration_display_is_transparent() {
        let err = SessionError::from(ConfigurationError::MissingListenDomain);
        assert_eq!(err.to_string(), "no listen domain configured");
    }

    #[test]
    fn invalid_pattern_display() {
        let err = ConfigurationError::InvalidPattern {
            pattern: "(".into(),
            reason: "unclosed group".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid origin pattern \"(\": unclosed group"
        );
    }
}
