//! Tracing/logging setup.
//!
//! Installs a default subscriber honoring the `[logging]` table from
//! [`crate::config::Settings`], falling back to `RUST_LOG` only when no
//! `level`/`filter` is configured.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Install a global `tracing` subscriber built from `logging`. A no-op if
/// a subscriber has already been installed (e.g. by a test harness).
pub fn init_tracing(logging: &LoggingSettings) {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let directive = logging.filter.clone().unwrap_or_else(|| logging.level.clone());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
