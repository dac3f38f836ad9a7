//! mongo-sample: health-gated MongoDB sample workload
//!
//! This crate connects an application and an administrative session to
//! MongoDB, waits for the database to answer a probe, runs a one-shot
//! demonstration workload and then drives a periodic reconcile loop until a
//! stop signal arrives. Metrics are exposed over HTTP.

pub mod config;
pub mod controller;
pub mod demo;
pub mod error;
pub mod rest_api;
pub mod telemetry;

pub use crate::error::{Error, Result};
