//! Console logging
//!
//! Harness log lines are emitted as `tracing` events; this installs the
//! subscriber that prints them on stderr. `RUST_LOG` overrides the filter
//! derived from `-q`/`-v`.

use crate::config::{CliConfig, Verbosity};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter for a verbosity, unless `RUST_LOG` is set
#[must_use]
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()))
}

/// Install the global subscriber
///
/// A second call is a no-op, so tests can call it freely.
pub fn init(config: &CliConfig) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(config.verbosity))
        .with(
            fmt::layer()
                .with_target(config.verbosity.is_verbose())
                .with_ansi(config.color.should_color())
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init();
}
