//! HTTP surface exposing metrics and liveness
//!
//! Runs on its own task, independent of the lifecycle controller.

mod handlers;
mod server;

pub use server::{router, MetricsServer};
