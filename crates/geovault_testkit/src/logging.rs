//! Tracing setup for tests.

use tracing_subscriber::EnvFilter;

/// Installs a test subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
/// Output goes through the test writer so it is captured per test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
