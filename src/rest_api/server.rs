//! Axum HTTP server for the metrics endpoint

use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::{Error, Result};

/// Routes served on the listen address
pub fn router() -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
}

/// A bound, not yet serving, metrics listener
///
/// Binding is split from serving so bind failures surface to the caller
/// before the server moves to its own task.
pub struct MetricsServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl MetricsServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::MetricsServer(format!("Failed to bind to {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::MetricsServer(format!("Failed to read bound address: {}", e)))?;

        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` is cancelled
    ///
    /// The task resolves to an error only if serving fails after binding.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            info!("Listening on {} for metrics", self.local_addr);
            axum::serve(self.listener, router())
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .map_err(|e| Error::MetricsServer(format!("Server error: {}", e)))
        })
    }
}
