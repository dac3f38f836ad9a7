//! Health gate: bounded readiness check against the primary session
//!
//! Probes are scheduled relative to the gate's start, one every `interval`,
//! for as long as the scheduled time is before `ceiling`. A failed probe is
//! only a warning; the gate fails once the ceiling passes without success.

use std::time::Duration;

use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::connection::Session;
use crate::error::{Error, Result};

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_PROBE_CEILING: Duration = Duration::from_secs(60);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Stand-in deadline when the ceiling does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Outcome of a gate that opened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateReport {
    /// Probes issued, including the successful one
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthGate {
    pub interval: Duration,
    pub ceiling: Duration,
    /// Bound on a single probe
    pub probe_timeout: Duration,
}

impl Default for HealthGate {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PROBE_INTERVAL,
            ceiling: DEFAULT_PROBE_CEILING,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl HealthGate {
    pub fn new(interval: Duration, ceiling: Duration, probe_timeout: Duration) -> Self {
        Self {
            interval,
            ceiling,
            probe_timeout,
        }
    }

    /// Block until the session answers a probe or the ceiling elapses
    ///
    /// Returns [`Error::ShutdownRequested`] if `shutdown` fires first.
    pub async fn wait_ready<S: Session>(
        &self,
        session: &S,
        shutdown: &CancellationToken,
    ) -> Result<GateReport> {
        let start = Instant::now();
        let deadline = start
            .checked_add(self.ceiling)
            .unwrap_or_else(|| start + FAR_FUTURE);
        let mut attempts: u32 = 0;

        info!("Checking access to database...");

        loop {
            attempts += 1;

            // A probe never runs past the ceiling
            let budget = self
                .probe_timeout
                .min(deadline.saturating_duration_since(Instant::now()));

            let probe = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(Error::ShutdownRequested),
                probe = timeout(budget, session.ping()) => probe,
            };

            let last_error = match probe {
                Ok(Ok(())) => {
                    super::metrics::inc_health_probe(true);
                    info!("Ping successful after {} attempt(s)", attempts);
                    return Ok(GateReport {
                        attempts,
                        elapsed: start.elapsed(),
                    });
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("probe timed out after {:?}", budget),
            };

            super::metrics::inc_health_probe(false);
            warn!(
                "Unable to ping database (attempt {}): {}",
                attempts, last_error
            );

            let next = self
                .interval
                .checked_mul(attempts)
                .and_then(|offset| start.checked_add(offset))
                .unwrap_or(deadline);
            let wake = next.min(deadline);

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(Error::ShutdownRequested),
                _ = sleep_until(wake) => {}
            }

            if next >= deadline || Instant::now() >= deadline {
                return Err(Error::HealthCheckTimeout {
                    attempts,
                    elapsed: start.elapsed(),
                    last_error,
                });
            }
        }
    }
}
