//! Log output for test runs.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Install a `tracing` subscriber that writes through the test harness
///
/// Honours `RUST_LOG` (`RUST_LOG=command_executor=trace` shows every line of
/// captured command output). Safe to call from every test; only the first call
/// installs a subscriber.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}
