//! Error types for the sample operator

use std::time::Duration;

use thiserror::Error;

use crate::controller::ConnectionScope;

#[derive(Error, Debug)]
pub enum Error {
    /// A required environment variable is unset or empty
    #[error("{0} is not defined")]
    MissingEnv(&'static str),

    /// A configuration value is present but unusable
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// A session with the backing store could not be established
    #[error("Failed to connect {scope} session: {source}")]
    Connection {
        scope: ConnectionScope,
        #[source]
        source: mongodb::error::Error,
    },

    /// The health gate ceiling elapsed without a successful probe
    #[error("Database not reachable after {attempts} probe(s) in {elapsed:?}: {last_error}")]
    HealthCheckTimeout {
        attempts: u32,
        elapsed: Duration,
        last_error: String,
    },

    /// A liveness probe failed
    #[error("Probe failed: {0}")]
    Probe(String),

    /// A reconciliation task iteration failed
    #[error("Reconcile error: {0}")]
    Reconcile(String),

    /// One or more connection handles failed to release
    #[error("Teardown failed: {}", .0.join("; "))]
    Teardown(Vec<String>),

    /// The metrics server could not bind or stopped serving
    #[error("Metrics server error: {0}")]
    MetricsServer(String),

    /// A database operation failed
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// The stop signal fired before startup completed
    #[error("Shutdown requested during startup")]
    ShutdownRequested,
}

impl Error {
    /// Short category label used by the metrics counters
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingEnv(_) | Error::InvalidConfig(_) => "config",
            Error::Connection { .. } => "connection",
            Error::HealthCheckTimeout { .. } | Error::Probe(_) => "health",
            Error::Reconcile(_) => "reconcile",
            Error::Teardown(_) => "teardown",
            Error::MetricsServer(_) => "metrics_server",
            Error::Database(_) => "database",
            Error::ShutdownRequested => "shutdown",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
