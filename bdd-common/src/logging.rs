//! Tracing initialization for suites and tests.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global tracing subscriber once.
///
/// Respects `RUST_LOG`; defaults to `info`. Safe to call from every test —
/// later calls are no-ops.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .compact()
            .try_init();
    });
}
