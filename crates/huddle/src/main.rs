//! # huddle
//!
//! Chat relay server binary. Loads settings, installs logging and metrics,
//! and serves the relay until Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use huddle_server::HuddleServer;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = huddle_settings::load_settings().context("Failed to load settings")?;

    huddle_core::logging::init_subscriber(&settings.logging.level, settings.logging.json)
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    let metrics = huddle_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = Arc::new(HuddleServer::new(&settings, Some(metrics)));
    let listener = server.bind().await?;

    let shutdown = server.shutdown().clone();
    let _signals = tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutting down...");
        shutdown.cancel();
    });

    server.serve(listener).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                let _ = sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
