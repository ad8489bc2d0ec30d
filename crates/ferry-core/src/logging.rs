//! Structured logging with `tracing`.
//!
//! Every ferry crate logs through the `tracing` macros with key-value fields
//! (`channel`, `request_id`, `origin`, `reason`). Dropped envelopes log at
//! `debug`/`trace` since a shared transport carries plenty of foreign traffic;
//! transport failures and listener failures log at `warn`.
//!
//! Embedders that already install a subscriber need nothing from this
//! module. Standalone tools call [`init_subscriber`] once at startup.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber with stderr output only.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - Minimum log level to display, e.g. `"warn"` or `"ferry_session=debug"`.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init is a no-op if a global default is already set
    let _ = subscriber.try_init();
}
