//! pagerun CLI
//!
//! Shared pieces of the `run-tests` and `page-runner` binaries.

pub mod output;

use tracing_subscriber::EnvFilter;

/// Initialize logging on stderr; stdout carries the textual result contract.
pub fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
