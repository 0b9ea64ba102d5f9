//! ## skysim-cli
//! **Scenario driver entrypoint**
//!
//! Runs an air-traffic scenario with live, replayed or archived feed
//! ingestion against the configured store.

use clap::Parser;
use skysim_telemetry::logging::EventLogger;
use skysim_telemetry::metrics::MetricsRecorder;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    EventLogger::init();
    let metrics = MetricsRecorder::new();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(run_args) => commands::run_scenario(run_args, metrics).await,
    }
}
