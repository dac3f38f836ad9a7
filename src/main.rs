use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mongo_sample::config::{parse_listen_addr, ConnectionConfig};
use mongo_sample::controller::{
    self, HealthGate, Lifecycle, LifecycleSettings, MongoConnector, ProcessLoop, ReconcileLoop,
};
use mongo_sample::demo::SampleWorkload;
use mongo_sample::{telemetry, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Perform no mutating actions
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// The address to serve metrics on (empty disables the endpoint)
    #[arg(long, env = "LISTEN_ADDR", default_value = ":8080")]
    listen: String,

    /// Bound on establishing each database session, in seconds
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout_secs: u64,

    /// Seconds between database probes while waiting for readiness
    #[arg(long, env = "HEALTH_INTERVAL_SECS", default_value_t = 15,
          value_parser = clap::value_parser!(u64).range(1..))]
    health_interval_secs: u64,

    /// Seconds to wait for the database before giving up
    #[arg(long, env = "HEALTH_TIMEOUT_SECS", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..))]
    health_timeout_secs: u64,

    /// Seconds between reconcile iterations
    #[arg(long, env = "RECONCILE_PERIOD_SECS", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    reconcile_period_secs: u64,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    telemetry::init_tracing(args.log_json);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting mongo-sample v{}", env!("CARGO_PKG_VERSION"));
    if args.dry_run {
        info!("Dry-run enabled: no mutating actions will be performed");
    }

    let connect_timeout = Duration::from_secs(args.connect_timeout_secs);
    let settings = LifecycleSettings {
        listen: parse_listen_addr(&args.listen)?,
        health_gate: HealthGate::new(
            Duration::from_secs(args.health_interval_secs),
            Duration::from_secs(args.health_timeout_secs),
            connect_timeout,
        ),
        reconcile: ReconcileLoop::new(Duration::from_secs(args.reconcile_period_secs)),
    };

    let shutdown = CancellationToken::new();
    controller::spawn_signal_listener(shutdown.clone());

    Lifecycle::new(
        MongoConnector::new(connect_timeout),
        SampleWorkload::new(args.dry_run),
        Arc::new(ProcessLoop::new(args.dry_run)),
        settings,
    )
    .run(ConnectionConfig::from_env, shutdown)
    .await
}
