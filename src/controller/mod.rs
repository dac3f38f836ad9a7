//! Controller module for the sample operator
//! This module contains the connection manager, the health gate, the
//! reconcile loop and the lifecycle controller that orders them.

mod connection;
mod health;
#[cfg(test)]
mod health_test;
mod lifecycle;
pub mod metrics;
mod reconciler;
#[cfg(test)]
mod reconciler_test;
pub mod shutdown;

pub use connection::{
    release_all, ConnectionDescriptor, ConnectionHandle, ConnectionScope, Connector,
    MongoConnector, Session, ADMIN_DATABASE, ADMIN_USER, DEFAULT_CONNECT_TIMEOUT,
};
pub use health::{
    GateReport, HealthGate, DEFAULT_PROBE_CEILING, DEFAULT_PROBE_INTERVAL, DEFAULT_PROBE_TIMEOUT,
};
pub use lifecycle::{Lifecycle, LifecycleSettings, Workload};
pub use reconciler::{
    LoopReport, ProcessLoop, ReconcileLoop, ReconcileTask, DEFAULT_RECONCILE_PERIOD,
};
pub use shutdown::spawn_signal_listener;
