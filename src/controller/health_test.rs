//! Tests for the health gate
//!
//! Time is paused, so probe schedules are checked against exact offsets
//! from the gate's start.

#[cfg(test)]
mod tests {
    use super::super::connection::{ConnectionScope, Session};
    use super::super::health::*;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    /// Session whose probe fails a fixed number of times before succeeding
    struct FlakySession {
        started: Instant,
        failures: Option<u32>,
        probe_delay: Duration,
        probes: Mutex<Vec<Duration>>,
    }

    impl FlakySession {
        fn failing(failures: u32) -> Self {
            Self {
                started: Instant::now(),
                failures: Some(failures),
                probe_delay: Duration::ZERO,
                probes: Mutex::new(Vec::new()),
            }
        }

        fn always_failing() -> Self {
            Self {
                failures: None,
                ..Self::failing(0)
            }
        }

        fn probe_offsets(&self) -> Vec<u64> {
            self.probes
                .lock()
                .unwrap()
                .iter()
                .map(|d| d.as_secs())
                .collect()
        }
    }

    #[async_trait]
    impl Session for FlakySession {
        fn scope(&self) -> ConnectionScope {
            ConnectionScope::Application
        }

        async fn ping(&self) -> Result<()> {
            let attempt = {
                let mut probes = self.probes.lock().unwrap();
                probes.push(self.started.elapsed());
                probes.len() as u32
            };
            if !self.probe_delay.is_zero() {
                tokio::time::sleep(self.probe_delay).await;
            }
            match self.failures {
                Some(failures) if attempt > failures => Ok(()),
                _ => Err(Error::Probe("connection refused".to_string())),
            }
        }

        async fn release(self) -> Result<()> {
            Ok(())
        }
    }

    fn gate() -> HealthGate {
        HealthGate::new(
            Duration::from_secs(15),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_on_first_probe() {
        let session = FlakySession::failing(0);
        let report = gate()
            .wait_ready(&session, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(report.elapsed, Duration::ZERO);
        assert_eq!(session.probe_offsets(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_k_failures_within_ceiling() {
        // 3 * 15s = 45s < 60s, so the fourth probe at t=45 succeeds
        let session = FlakySession::failing(3);
        let report = gate()
            .wait_ready(&session, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.attempts, 4);
        assert_eq!(session.probe_offsets(), vec![0, 15, 30, 45]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_when_k_failures_reach_ceiling() {
        // 4 * 15s = 60s is not before the ceiling, so no fifth probe is made
        let session = FlakySession::failing(4);
        let start = Instant::now();
        let err = gate()
            .wait_ready(&session, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::HealthCheckTimeout { attempts: 4, .. }));
        assert_eq!(session.probe_offsets(), vec![0, 15, 30, 45]);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuous_failure_makes_four_attempts() {
        let session = FlakySession::always_failing();
        let err = gate()
            .wait_ready(&session, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            Error::HealthCheckTimeout {
                attempts,
                elapsed,
                last_error,
            } => {
                assert_eq!(attempts, 4);
                assert_eq!(elapsed, Duration::from_secs(60));
                assert!(last_error.contains("connection refused"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(session.probe_offsets(), vec![0, 15, 30, 45]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_is_bounded_by_probe_timeout() {
        let session = FlakySession {
            probe_delay: Duration::from_secs(30),
            ..FlakySession::failing(0)
        };
        let err = gate()
            .wait_ready(&session, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            Error::HealthCheckTimeout { last_error, .. } => {
                assert!(last_error.contains("timed out"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        // Schedule stays anchored to the start despite each probe taking 10s
        assert_eq!(session.probe_offsets(), vec![0, 15, 30, 45]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_signal_aborts_gate() {
        let session = FlakySession::always_failing();
        let shutdown = CancellationToken::new();

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(20)).await;
            canceller.cancel();
        });

        let err = gate().wait_ready(&session, &shutdown).await.unwrap_err();
        assert!(matches!(err, Error::ShutdownRequested));
        assert_eq!(session.probe_offsets(), vec![0, 15]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ceiling_does_not_overflow() {
        let session = FlakySession::failing(2);
        let gate = HealthGate::new(
            Duration::from_secs(15),
            Duration::from_secs(u64::MAX),
            Duration::from_secs(10),
        );

        let report = gate
            .wait_ready(&session, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.attempts, 3);
        assert_eq!(session.probe_offsets(), vec![0, 15, 30]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_fails_at_ceiling() {
        let session = FlakySession::always_failing();
        let start = Instant::now();
        let gate = HealthGate::new(
            Duration::from_secs(u64::MAX),
            Duration::from_secs(60),
            Duration::from_secs(10),
        );

        let err = gate
            .wait_ready(&session, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::HealthCheckTimeout { attempts: 1, .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_is_cut_off_at_ceiling() {
        // Probe timeout 40s: the second probe starts at t=40 and gets only
        // the 20s left before the ceiling
        let session = FlakySession {
            probe_delay: Duration::from_secs(100),
            ..FlakySession::failing(0)
        };
        let start = Instant::now();
        let gate = HealthGate::new(
            Duration::from_secs(15),
            Duration::from_secs(60),
            Duration::from_secs(40),
        );

        let err = gate
            .wait_ready(&session, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            Error::HealthCheckTimeout {
                attempts, elapsed, ..
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(elapsed, Duration::from_secs(60));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(session.probe_offsets(), vec![0, 40]);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_issues_no_probe() {
        let session = FlakySession::failing(0);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let err = gate().wait_ready(&session, &shutdown).await.unwrap_err();
        assert!(matches!(err, Error::ShutdownRequested));
        assert!(session.probe_offsets().is_empty());
    }
}
