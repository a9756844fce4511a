//! Support for tracing execution of a program.

use tracing_subscriber::{fmt::Subscriber, prelude::*, EnvFilter};

/// The filter used when `RUST_LOG` is unset or unparseable.
const DEFAULT_FILTER: &str = "warn";

/// Set up the `tracing` library with reasonable options.
///
/// Output goes to standard error, because our standard output is usually a
/// manifest which will be piped into `kubectl apply -f -`.
pub fn initialize_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .finish()
        .init();
}
