use std::time::Duration;

use tokio::signal;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// Stop accepting background work and wait up to `deadline` for what is
/// already running. Returns `false` when tasks were still running at the
/// deadline; their attempts stay open until a later claim releases them.
pub async fn drain_background(tasks: &TaskTracker, deadline: Duration) -> bool {
    tasks.close();
    if tasks.is_empty() {
        return true;
    }
    info!(pending = tasks.len(), "waiting for background processing");
    match tokio::time::timeout(deadline, tasks.wait()).await {
        Ok(()) => true,
        Err(_) => {
            warn!(
                pending = tasks.len(),
                "background processing still running at shutdown"
            );
            false
        }
    }
}
