//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

/// Boxed error returned when a global subscriber is already installed.
pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build the filter: `RUST_LOG` wins, otherwise `default_level`.
pub fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber.
///
/// `json` selects newline-delimited JSON output (for log shippers); otherwise
/// the human-readable formatter is used. Fails if a subscriber is already set.
pub fn init_subscriber(default_level: &str, json: bool) -> Result<(), InitError> {
    let filter = build_filter(default_level);
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    }
}
