//! Diagnostic tracing for the conductor CLI.
//!
//! Workflow output goes to stdout; tracing goes to stderr so `--json` output
//! stays machine-readable.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the filter follows the number of
/// `-v` flags: none is `warn`, one is `info`, two or more is `debug`.
///
/// # Example
/// ```bash
/// RUST_LOG=conductor=trace conductor lint "ruff check" src
/// ```
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,conductor=info",
        _ => "warn,conductor=debug",
    }
}
