//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "CODEPILOT_LOG";

static INIT: Once = Once::new();

/// Install the global subscriber, writing to stderr.
///
/// Reads [`LOG_ENV`] (e.g. `CODEPILOT_LOG=codepilot_core=debug,info`),
/// falling back to `default_level` when unset or invalid. Idempotent.
pub fn init_tracing(default_level: &str) {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
