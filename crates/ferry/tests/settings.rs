//! Sessions built from settings files.

use std::sync::Arc;
use std::time::Duration;

use ferry::{AckExpiry, MemoryTransport, OriginPattern, session_from_settings};
use ferry_settings::load_settings_from_path;

#[test]
fn session_follows_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{
            "session": {
                "sendDomain": "https://b.example",
                "listenDomain": ["https://a.example", {"pattern": "\\.trusted\\.example$"}],
                "timeoutMs": 1500,
                "ackExpiry": "notify"
            },
            "logging": {"level": "debug"}
        }"#,
    )
    .unwrap();

    let settings = load_settings_from_path(&path).unwrap();
    let session = session_from_settings(Arc::new(MemoryTransport::new()), &settings);
    let config = session.config();

    assert_eq!(config.send_domain(), Some("https://b.example"));
    assert_eq!(config.listen_domain()[0], OriginPattern::exact("https://a.example"));
    assert!(config.listen_domain()[1].matches("https://x.trusted.example"));
    assert_eq!(config.timeout(), Duration::from_millis(1500));
    assert_eq!(config.listen_timeout(), Duration::from_millis(100));
    assert_eq!(config.ack_expiry(), AckExpiry::Notify);
}

#[test]
fn missing_file_gives_an_unconfigured_session() {
    let dir = tempfile::tempdir().unwrap();
    let settings = load_settings_from_path(&dir.path().join("absent.json")).unwrap();
    let session = session_from_settings(Arc::new(MemoryTransport::new()), &settings);
    assert!(session.config().listen_domain().is_empty());
    assert_eq!(session.config().timeout(), Duration::from_millis(3000));
}
