//! Structured logging with `tracing`.
//!
//! - [`install_subscriber`] installs the process-wide stderr subscriber
//!   (compact or JSON), as configured by `logging` in the settings
//! - [`capture_logs`] installs a thread-local capturing subscriber for tests
//!
//! Engine components log registration, join rebuilds and publishes at
//! `debug`; isolated failures surface at `warn` through the
//! [`TracingSink`](crate::diagnostics::TracingSink).

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - Minimum log level to display, e.g. `"warn"` or `"morph_engine=debug"`.
pub fn init_subscriber(level: &str) {
    let _ = install_subscriber(level, false);
}

/// Initialize the global tracing subscriber with JSON lines on stderr.
///
/// Intended for hosts that ship logs to a collector.
pub fn init_json_subscriber(level: &str) {
    let _ = install_subscriber(level, true);
}

/// Install the global stderr subscriber, compact or JSON.
///
/// Returns `false` when a global subscriber was already set, in which case
/// the existing one is left in place.
pub fn install_subscriber(level: &str, json: bool) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init().is_ok()
    } else {
        builder.compact().try_init().is_ok()
    };
    if installed {
        tracing::debug!(level, json, "installed global subscriber");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_does_not_panic() {
        // Multiple calls should be safe (no-op after first)
        init_subscriber("warn");
        init_subscriber("debug");
        init_json_subscriber("info");
    }

    #[test]
    fn second_install_keeps_existing_subscriber() {
        let _ = install_subscriber("warn", false);
        assert!(!install_subscriber("debug", true));
        assert!(!install_subscriber("trace", false));
    }
}
