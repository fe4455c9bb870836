//! Tracing subscriber setup.
//!
//! Logs go to stderr. Stdout carries command output and, in `serve` mode, the
//! host command stream, so nothing else may write there.

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` when set and valid, otherwise `default_level`.
pub(crate) fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(default_level: &str) {
    if tracing::subscriber::set_global_default(build_subscriber(default_level)).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// fmt subscriber on stderr, without targets.
pub(crate) fn build_subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish()
}
