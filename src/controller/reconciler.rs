//! Periodic reconciliation loop
//!
//! Runs a [`ReconcileTask`] immediately, then again one `period` after each
//! iteration completes, until the stop signal is observed at an iteration
//! boundary. A running iteration is never interrupted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::metrics;
use crate::error::Result;

pub const DEFAULT_RECONCILE_PERIOD: Duration = Duration::from_secs(5 * 60);

/// A named, stateless unit of work run on every tick
#[async_trait]
pub trait ReconcileTask: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn reconcile(&self) -> Result<()>;
}

/// Placeholder task that always succeeds
#[derive(Clone, Debug, Default)]
pub struct ProcessLoop {
    pub dry_run: bool,
}

impl ProcessLoop {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

#[async_trait]
impl ReconcileTask for ProcessLoop {
    fn name(&self) -> &str {
        "process-loop"
    }

    async fn reconcile(&self) -> Result<()> {
        if self.dry_run {
            debug!("Dry-run enabled, process loop applies no changes");
        }
        Ok(())
    }
}

/// Counts reported when the loop exits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub iterations: u64,
    pub failures: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct ReconcileLoop {
    period: Duration,
}

impl Default for ReconcileLoop {
    fn default() -> Self {
        Self::new(DEFAULT_RECONCILE_PERIOD)
    }
}

impl ReconcileLoop {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run the loop on its own task
    pub fn spawn<T: ReconcileTask>(
        self,
        task: Arc<T>,
        shutdown: CancellationToken,
    ) -> JoinHandle<LoopReport> {
        tokio::spawn(async move { self.run(task.as_ref(), &shutdown).await })
    }

    /// Run until `shutdown` is cancelled
    pub async fn run<T: ReconcileTask + ?Sized>(
        &self,
        task: &T,
        shutdown: &CancellationToken,
    ) -> LoopReport {
        let mut report = LoopReport::default();

        info!(
            "Starting reconcile loop for {} every {:?}",
            task.name(),
            self.period
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            report.iterations += 1;
            if !run_iteration(task).await {
                report.failures += 1;
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
        }

        info!(
            "Reconcile loop for {} stopped after {} iteration(s), {} failed",
            task.name(),
            report.iterations,
            report.failures
        );
        report
    }
}

/// Time one iteration and record its outcome. Returns `true` on success.
async fn run_iteration<T: ReconcileTask + ?Sized>(task: &T) -> bool {
    let name = task.name();
    let start = Instant::now();

    metrics::inc_reconcile_run(name);
    let result = task.reconcile().await;
    let duration = start.elapsed();
    metrics::observe_reconcile_duration_seconds(name, duration.as_secs_f64());

    match result {
        Ok(()) => {
            info!("{} finished in: {} ms", name, duration.as_millis());
            true
        }
        Err(e) => {
            metrics::inc_reconcile_error(name, e.kind());
            error!("{} failed after {} ms: {}", name, duration.as_millis(), e);
            false
        }
    }
}
