//! Server startup errors.

use std::io;

use metrics_exporter_prometheus::BuildError;

/// Failures while bringing the server up. Per-connection problems never
/// surface here; they end the connection instead.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The accept loop failed.
    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    /// The metrics recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError),
}
