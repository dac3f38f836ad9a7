//! Delivers the stop signal on process termination requests

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for SIGINT or SIGTERM (Ctrl-C on non-Unix targets)
pub async fn wait_for_termination() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Cancel `shutdown` once a termination request arrives
pub fn spawn_signal_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = wait_for_termination() => {
                match result {
                    Ok(()) => info!("Termination signal received, shutting down"),
                    Err(e) => warn!("Signal handler failed, shutting down: {}", e),
                }
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
    })
}
