//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`FerrySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `FERRY_*` environment overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use ferry_core::OriginPattern;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{AckExpiry, FerrySettings};

/// Upper bound accepted for timeout overrides, in milliseconds.
const MAX_TIMEOUT_MS: u64 = 600_000;

/// Resolve the path to the settings file (`~/.ferry/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ferry").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<FerrySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields the defaults. Invalid JSON, a value of the wrong
/// shape, or an uncompilable origin pattern is an error.
pub fn load_settings_from_path(path: &Path) -> Result<FerrySettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Load defaults merged with `path`, without env overrides or validation.
pub fn load_file(path: &Path) -> Result<FerrySettings> {
    let defaults = serde_json::to_value(FerrySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reject settings that parse but cannot work.
pub fn validate(settings: &FerrySettings) -> Result<()> {
    let session = &settings.session;
    if session.send_domain.as_deref() == Some("") {
        return Err(SettingsError::InvalidValue {
            key: "sendDomain",
            reason: "must not be empty".into(),
        });
    }
    let empty_exact = session
        .listen_domain
        .iter()
        .any(|p| matches!(p, OriginPattern::Exact(origin) if origin.is_empty()));
    if empty_exact {
        return Err(SettingsError::InvalidValue {
            key: "listenDomain",
            reason: "origins must not be empty".into(),
        });
    }
    Ok(())
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut FerrySettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Recognized keys:
/// - `FERRY_SEND_DOMAIN`: default send origin
/// - `FERRY_LISTEN_DOMAINS`: comma-separated exact listen origins (replaces the list)
/// - `FERRY_TIMEOUT_MS`: response-wait, `1..=600000`
/// - `FERRY_LISTEN_TIMEOUT_MS`: ack-wait, `1..=600000`
/// - `FERRY_ACK_EXPIRY`: `settle` or `notify`
/// - `FERRY_LOG_LEVEL`: tracing filter directive
///
/// Empty values are ignored; invalid values are ignored with a warning.
pub fn apply_overrides(settings: &mut FerrySettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = read("FERRY_SEND_DOMAIN") {
        settings.session.send_domain = Some(v.trim().to_string());
    }
    if let Some(v) = read("FERRY_LISTEN_DOMAINS") {
        settings.session.listen_domain = parse_origin_list(&v);
    }
    if let Some(v) = read("FERRY_TIMEOUT_MS") {
        match parse_u64_range(&v, 1, MAX_TIMEOUT_MS) {
            Some(ms) => settings.session.timeout_ms = ms,
            None => warn!(key = "FERRY_TIMEOUT_MS", value = %v, "invalid timeout env var, ignoring"),
        }
    }
    if let Some(v) = read("FERRY_LISTEN_TIMEOUT_MS") {
        match parse_u64_range(&v, 1, MAX_TIMEOUT_MS) {
            Some(ms) => settings.session.listen_timeout_ms = ms,
            None => {
                warn!(key = "FERRY_LISTEN_TIMEOUT_MS", value = %v, "invalid timeout env var, ignoring");
            }
        }
    }
    if let Some(v) = read("FERRY_ACK_EXPIRY") {
        match parse_ack_expiry(&v) {
            Some(policy) => settings.session.ack_expiry = policy,
            None => warn!(key = "FERRY_ACK_EXPIRY", value = %v, "invalid ack expiry env var, ignoring"),
        }
    }
    if let Some(v) = read("FERRY_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse an ack expiry policy name (case-insensitive).
pub fn parse_ack_expiry(val: &str) -> Option<AckExpiry> {
    match val.trim().to_lowercase().as_str() {
        "settle" => Some(AckExpiry::Settle),
        "notify" => Some(AckExpiry::Notify),
        _ => None,
    }
}

/// Parse a comma-separated list of exact origins, skipping blanks.
pub fn parse_origin_list(val: &str) -> Vec<OriginPattern> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(OriginPattern::exact)
        .collect()
}
