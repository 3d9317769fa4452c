//! Structured logging setup
//!
//! Logs go to stderr so that stdout stays reserved for the JSON results the
//! command-line tool prints.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Default filter directive for a `-v` count
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,shapefile_publisher=info",
        1 => "info,shapefile_publisher=debug",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber; `RUST_LOG` takes precedence over `verbosity`
///
/// Safe to call more than once.
pub fn init_logging(verbosity: u8, json: bool) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));

        let result = if json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .json(),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false),
                )
                .try_init()
        };

        if result.is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }
    });
}
