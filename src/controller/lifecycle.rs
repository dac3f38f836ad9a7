//! Lifecycle controller: startup ordering, blocking wait and teardown
//!
//! Order: metrics server → configuration → application session → admin
//! session → health gate → one-shot workload → reconcile loop → wait for the
//! stop signal → drain the loop → release admin, then application.
//!
//! Once bound, the metrics server ending for any reason is fatal, including
//! while the health gate or the workload is still running.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::connection::{release_all, ConnectionDescriptor, Connector, Session};
use super::health::HealthGate;
use super::reconciler::{ReconcileLoop, ReconcileTask};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::rest_api::MetricsServer;

/// One-shot work run after the health gate opens
#[async_trait]
pub trait Workload<H: Session>: Send + Sync + 'static {
    async fn run_once(&self, app: &H, admin: &H) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleSettings {
    /// Metrics listen address, `None` disables the endpoint
    pub listen: Option<SocketAddr>,
    pub health_gate: HealthGate,
    pub reconcile: ReconcileLoop,
}

pub struct Lifecycle<C, W, T> {
    connector: C,
    workload: W,
    task: Arc<T>,
    settings: LifecycleSettings,
}

type ServerHandle = JoinHandle<Result<()>>;

impl<C, W, T> Lifecycle<C, W, T>
where
    C: Connector,
    W: Workload<C::Handle>,
    T: ReconcileTask,
{
    pub fn new(connector: C, workload: W, task: Arc<T>, settings: LifecycleSettings) -> Self {
        Self {
            connector,
            workload,
            task,
            settings,
        }
    }

    /// Run to completion
    ///
    /// `load_config` is called after the metrics server starts and before
    /// any connection attempt. Returns `Ok(())` after a graceful stop; any
    /// fatal startup, metrics server or teardown failure is returned as an
    /// error.
    pub async fn run<L>(self, load_config: L, shutdown: CancellationToken) -> Result<()>
    where
        L: FnOnce() -> Result<ConnectionConfig>,
    {
        info!("Starting...");

        let server_stop = shutdown.child_token();
        let mut server = match self.settings.listen {
            Some(addr) => Some(MetricsServer::bind(addr).await?.spawn(server_stop.clone())),
            None => {
                info!("Metrics endpoint disabled");
                None
            }
        };

        let result = self.run_sessions(load_config, &shutdown, &mut server).await;

        server_stop.cancel();
        if let Some(handle) = server {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Metrics server stopped with error: {}", e),
                Err(e) => warn!("Metrics server task failed: {}", e),
            }
        }

        result
    }

    async fn run_sessions<L>(
        &self,
        load_config: L,
        shutdown: &CancellationToken,
        server: &mut Option<ServerHandle>,
    ) -> Result<()>
    where
        L: FnOnce() -> Result<ConnectionConfig>,
    {
        let config = load_config()?;
        info!("Loaded configuration: {:?}", config);

        let app_descriptor = ConnectionDescriptor::application(&config)?;
        let admin_descriptor = ConnectionDescriptor::admin(&config)?;

        let app = self.connector.connect(&app_descriptor).await?;
        let admin = match self.connector.connect(&admin_descriptor).await {
            Ok(admin) => admin,
            Err(e) => {
                if let Err(teardown) = release_all(vec![app]).await {
                    error!("{}", teardown);
                }
                return Err(e);
            }
        };

        let outcome = self.serve(&app, &admin, shutdown, server).await;
        let teardown = release_all(vec![admin, app]).await;

        match (outcome, teardown) {
            (Ok(()), teardown) => teardown,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(teardown)) => {
                error!("{}", teardown);
                Err(e)
            }
        }
    }

    async fn serve(
        &self,
        app: &C::Handle,
        admin: &C::Handle,
        shutdown: &CancellationToken,
        server: &mut Option<ServerHandle>,
    ) -> Result<()> {
        let startup = async {
            self.settings.health_gate.wait_ready(app, shutdown).await?;
            self.workload.run_once(app, admin).await
        };
        tokio::select! {
            result = startup => result?,
            e = server_exit(server) => return Err(e),
        }

        let loop_stop = shutdown.child_token();
        let reconcile = self
            .settings
            .reconcile
            .spawn(self.task.clone(), loop_stop.clone());

        let waited = wait_for_stop(shutdown, server).await;

        loop_stop.cancel();
        match reconcile.await {
            Ok(report) => info!(
                "Reconcile loop drained: {} iteration(s), {} failed",
                report.iterations, report.failures
            ),
            Err(e) => error!("Reconcile loop task failed: {}", e),
        }

        info!("Exit...");
        waited
    }
}

/// Block until the stop signal fires or the metrics server exits
async fn wait_for_stop(
    shutdown: &CancellationToken,
    server: &mut Option<ServerHandle>,
) -> Result<()> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Ok(()),
        e = server_exit(server) => Err(e),
    }
}

/// Resolve once the metrics server task ends, never if there is none
///
/// The server only stops on its own when something went wrong, so every
/// outcome maps to an error. The handle is cleared once joined.
async fn server_exit(server: &mut Option<ServerHandle>) -> Error {
    let Some(handle) = server.as_mut() else {
        return std::future::pending().await;
    };
    let joined = handle.await;
    *server = None;

    match joined {
        Ok(Ok(())) => Error::MetricsServer("server exited unexpectedly".to_string()),
        Ok(Err(e)) => e,
        Err(e) => Error::MetricsServer(format!("server task failed: {}", e)),
    }
}
