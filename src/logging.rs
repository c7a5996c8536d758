//! Structured logging setup, initialized at most once per process.
//!
//! Grounded on this codebase's `util::init_tracing_once`: a `tracing_subscriber`
//! registry driven by `RUST_LOG`, defaulting to `info` when unset, installed
//! behind a `std::sync::Once` so repeated calls (e.g. from multiple jobs run
//! in the same process, or from tests) are harmless.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a global `tracing` subscriber on the first call; a no-op on
/// every call after that.
pub fn init_tracing_once() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            // Another subscriber (e.g. the test harness's) already won the race.
        }
    });
}
