//! Origin authorization for inbound envelopes.

use ferry_core::OriginPattern;

use crate::correlation::CorrelationTable;

/// Decides whether an inbound origin may be listened to or may complete a
/// pending request.
#[derive(Clone, Debug)]
pub struct OriginGuard {
    send_domain: Option<String>,
    listen: Vec<OriginPattern>,
}

impl OriginGuard {
    /// Build a guard from the session's origins.
    pub fn new(send_domain: Option<String>, listen: Vec<OriginPattern>) -> Self {
        Self {
            send_domain,
            listen,
        }
    }

    /// Whether `origin` equals a configured listen origin or matches a
    /// configured pattern.
    pub fn accepts_listen(&self, origin: &str) -> bool {
        self.listen.iter().any(|p| p.matches(origin))
    }

    /// Whether `origin` is the default send origin or the target of any
    /// pending request.
    pub fn accepts_response(&self, origin: &str, pending: &CorrelationTable) -> bool {
        self.send_domain.as_deref() == Some(origin) || pending.has_target(origin)
    }

    /// Whether any listen origin is configured.
    pub fn can_listen(&self) -> bool {
        !self.listen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> OriginGuard {
        OriginGuard::new(
            Some("https://b.example".into()),
            vec![
                OriginPattern::exact("https://a.example"),
                OriginPattern::pattern(r"\.trusted\.example$").unwrap(),
            ],
        )
    }

    #[test]
    fn exact_listen_origin() {
        let g = guard();
        assert!(g.accepts_listen("https://a.example"));
        assert!(!g.accepts_listen("https://a.example.evil"));
    }

    #[test]
    fn pattern_listen_origin() {
        let g = guard();
        assert!(g.accepts_listen("https://app.trusted.example"));
        assert!(!g.accepts_listen("https://trusted.example.evil"));
    }

    #[test]
    fn response_from_default_send_origin() {
        let g = guard();
        let table = CorrelationTable::new();
        assert!(g.accepts_response("https://b.example", &table));
        assert!(!g.accepts_response("https://a.example", &table));
    }

    #[test]
    fn no_origins_accepts_nothing() {
        let g = OriginGuard::new(None, Vec::new());
        let table = CorrelationTable::new();
        assert!(!g.can_listen());
        assert!(!g.accepts_listen("https://a.example"));
        assert!(!g.accepts_response("https://a.example", &table));
    }
}
