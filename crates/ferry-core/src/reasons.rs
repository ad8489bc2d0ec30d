//! Failure reasons reported to requesters.
//!
//! These strings travel as the `data` of a negative completion, either
//! generated locally by the requester's timers or sent by the remote
//! dispatcher inside a `response` envelope.

/// The ack-wait window elapsed without any listener acknowledging.
pub const NO_LISTENER: &str = "No listener";

/// The response-wait window elapsed without a response.
pub const TIMEOUT: &str = "Timeout";

/// A listener failed while handling the request. The failure detail stays
/// on the listening side.
pub const UNKNOWN_ERROR: &str = "Unknown Error";

/// Reason sent when a request names a channel nobody listens on.
pub fn invalid_channel(channel: &str) -> String {
    format!("Invalid Channel: {channel}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_channel_names_the_channel() {
        assert_eq!(invalid_channel("other"), "Invalid Channel: other");
    }
}
