//! Tests for the reconcile loop
//!
//! These tests verify the loop's scheduling contract:
//! - Iterations start one period after the previous one completes
//! - A failed iteration is retried at the next tick, not immediately
//! - The stop signal prevents new iterations but never interrupts one

#[cfg(test)]
mod tests {
    use super::super::reconciler::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    const PERIOD: Duration = Duration::from_secs(300);

    /// Task that records start/finish offsets and fails on chosen iterations
    struct ScriptedTask {
        started: Instant,
        work: Duration,
        fail_on: Vec<u32>,
        calls: AtomicU32,
        starts: Mutex<Vec<u64>>,
        finishes: Mutex<Vec<u64>>,
    }

    impl ScriptedTask {
        fn new(work: Duration, fail_on: Vec<u32>) -> Arc<Self> {
            Arc::new(Self {
                started: Instant::now(),
                work,
                fail_on,
                calls: AtomicU32::new(0),
                starts: Mutex::new(Vec::new()),
                finishes: Mutex::new(Vec::new()),
            })
        }

        fn starts(&self) -> Vec<u64> {
            self.starts.lock().unwrap().clone()
        }

        fn finishes(&self) -> Vec<u64> {
            self.finishes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReconcileTask for ScriptedTask {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn reconcile(&self) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.starts
                .lock()
                .unwrap()
                .push(self.started.elapsed().as_secs());
            if !self.work.is_zero() {
                tokio::time::sleep(self.work).await;
            }
            self.finishes
                .lock()
                .unwrap()
                .push(self.started.elapsed().as_secs());

            if self.fail_on.contains(&call) {
                Err(Error::Reconcile(format!("iteration {call} failed")))
            } else {
                Ok(())
            }
        }
    }

    fn cancel_after(shutdown: &CancellationToken, after: Duration) {
        let token = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            token.cancel();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_iteration_runs_immediately() {
        let task = ScriptedTask::new(Duration::ZERO, vec![]);
        let shutdown = CancellationToken::new();
        cancel_after(&shutdown, Duration::from_secs(1));

        let report = ReconcileLoop::new(PERIOD)
            .run(task.as_ref(), &shutdown)
            .await;

        assert_eq!(task.starts(), vec![0]);
        assert_eq!(
            report,
            LoopReport {
                iterations: 1,
                failures: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_iteration_starts_after_stop_signal() {
        let task = ScriptedTask::new(Duration::ZERO, vec![]);
        let shutdown = CancellationToken::new();
        cancel_after(&shutdown, Duration::from_secs(700));

        let report = ReconcileLoop::new(PERIOD)
            .run(task.as_ref(), &shutdown)
            .await;

        assert_eq!(task.starts(), vec![0, 300, 600]);
        assert_eq!(report.iterations, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_iteration_retried_at_next_tick() {
        let task = ScriptedTask::new(Duration::ZERO, vec![1]);
        let shutdown = CancellationToken::new();
        cancel_after(&shutdown, Duration::from_secs(350));

        let report = ReconcileLoop::new(PERIOD)
            .run(task.as_ref(), &shutdown)
            .await;

        assert_eq!(task.starts(), vec![0, 300]);
        assert_eq!(
            report,
            LoopReport {
                iterations: 2,
                failures: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_iteration_runs_to_completion() {
        let task = ScriptedTask::new(Duration::from_secs(10), vec![]);
        let shutdown = CancellationToken::new();
        cancel_after(&shutdown, Duration::from_secs(5));
        let start = Instant::now();

        let report = ReconcileLoop::new(PERIOD)
            .run(task.as_ref(), &shutdown)
            .await;

        assert_eq!(task.starts(), vec![0]);
        assert_eq!(task.finishes(), vec![10]);
        assert_eq!(report.iterations, 1);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_measured_from_completion() {
        let task = ScriptedTask::new(Duration::from_secs(100), vec![]);
        let shutdown = CancellationToken::new();
        cancel_after(&shutdown, Duration::from_secs(450));

        ReconcileLoop::new(PERIOD)
            .run(task.as_ref(), &shutdown)
            .await;

        // Iterations never overlap: the second starts 300s after the first ends
        assert_eq!(task.starts(), vec![0, 400]);
        assert_eq!(task.finishes(), vec![100, 500]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_runs_nothing() {
        let task = ScriptedTask::new(Duration::ZERO, vec![]);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let report = ReconcileLoop::default()
            .run(task.as_ref(), &shutdown)
            .await;

        assert!(task.starts().is_empty());
        assert_eq!(report, LoopReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_returns_report_on_stop() {
        let task = ScriptedTask::new(Duration::ZERO, vec![2]);
        let shutdown = CancellationToken::new();

        let handle = ReconcileLoop::new(PERIOD).spawn(task.clone(), shutdown.clone());
        tokio::time::sleep(Duration::from_secs(301)).await;
        shutdown.cancel();

        let report = handle.await.unwrap();
        assert_eq!(report.iterations, 2);
        assert_eq!(report.failures, 1);
    }

    #[tokio::test]
    async fn test_process_loop_always_succeeds() {
        tokio_test::assert_ok!(ProcessLoop::new(false).reconcile().await);
        tokio_test::assert_ok!(ProcessLoop::new(true).reconcile().await);
        assert_eq!(ProcessLoop::default().name(), "process-loop");
    }
}
