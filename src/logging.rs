//! Tracing setup.
//!
//! Logs go to stderr so command output on stdout stays clean for piping.
//! `RUST_LOG` controls filtering and defaults to `info`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}
