//! Signal handling for graceful shutdown.

use tokio::signal::unix::{Signal, SignalKind, signal};

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C). A handler that cannot be
/// installed is logged and never fires.
pub async fn shutdown_signal() {
    let mut sigterm = install(SignalKind::terminate(), "SIGTERM");
    let mut sigint = install(SignalKind::interrupt(), "SIGINT");

    tokio::select! {
        _ = recv(sigterm.as_mut()) => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = recv(sigint.as_mut()) => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

fn install(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(sig) => Some(sig),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install {} handler", name);
            None
        }
    }
}

async fn recv(sig: Option<&mut Signal>) {
    match sig {
        Some(sig) => {
            sig.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}
