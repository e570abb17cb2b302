//! Diagnostic tracing for the blogtool CLI.
//!
//! Command results go to stdout. Tracing output is for diagnosing tool
//! invocations and goes to stderr, filtered by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset, or `warn,blogtool=debug`
/// when `verbose` is set.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=blogtool=debug blogtool status
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "warn,blogtool=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
