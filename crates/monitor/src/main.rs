//! Monitor binary that watches the chain for work() calls on Sequencer jobs.

use std::io;

use job_watch_domain::config::BootstrapConfig;
use job_watch_domain::services::telemetry::{init_telemetry, TelemetryConfig};
use job_watch_monitor::{build_rpc_engine, run_monitor, MonitorError};

#[tokio::main]
async fn main() -> io::Result<()> {
    if let Err(err) = bootstrap().await {
        eprintln!("[monitor] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

async fn bootstrap() -> Result<(), MonitorError> {
    let config = BootstrapConfig::load_from_env()?;
    let telemetry_config = TelemetryConfig::from_env("MONITOR");
    init_telemetry(&telemetry_config)?;
    let engine = build_rpc_engine(&config)?;
    run_monitor(&config, engine).await
}
