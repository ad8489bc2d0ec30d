//! # ferry-settings
//!
//! Layered configuration for ferry sessions.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`FerrySettings::default()`]
//! 2. **User file**: `~/.ferry/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `FERRY_*` overrides (highest priority)
//!
//! ```json
//! {
//!   "session": {
//!     "sendDomain": "https://parent.example",
//!     "listenDomain": ["https://parent.example", {"pattern": "^https://[a-z]+\\.parent\\.example$"}],
//!     "timeoutMs": 3000,
//!     "listenTimeoutMs": 100,
//!     "ackExpiry": "settle"
//!   },
//!   "logging": { "level": "warn" }
//! }
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_overrides, deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
