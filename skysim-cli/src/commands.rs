use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use opentelemetry::KeyValue;
use tracing::info;
use validator::Validate;

use skysim_config::SkysimConfig;
use skysim_engine::ScenarioRuntime;
use skysim_feed::connector::wall_epoch;
use skysim_feed::{Store, SyntheticStore};
use skysim_telemetry::logging::EventLogger;
use skysim_telemetry::metrics::MetricsRecorder;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario with feed ingestion (live, replay or archive)
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Configuration file; config/skysim.yaml and SKYSIM_* apply otherwise
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the configured feed mode (live, replay, archive)
    #[arg(short, long)]
    pub mode: Option<String>,
    /// Stop once simulated time reaches this many seconds
    #[arg(long)]
    pub horizon: Option<f64>,
    /// Fast-forward with this fixed step instead of wall-clock pacing
    #[arg(long)]
    pub fast_forward: Option<f64>,
}

pub async fn run_scenario(args: RunArgs, metrics: MetricsRecorder) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => SkysimConfig::load_from_path(path)?,
        None => SkysimConfig::load()?,
    };
    if let Some(mode) = args.mode {
        config.feed.mode = mode;
        config.validate().map_err(skysim_config::ConfigError::from)?;
    }

    EventLogger::log_event(
        "scenario_start",
        vec![
            KeyValue::new("mode", config.feed.mode.clone()),
            KeyValue::new("endpoint", config.store.endpoint.clone()),
        ],
    )
    .await;

    let store = build_store(&config)?;
    let metrics = Arc::new(metrics);
    let mut runtime = ScenarioRuntime::new(&config, store, metrics.clone())?;
    if let Some(step) = args.fast_forward {
        runtime.fast_forward(step, args.horizon);
    }

    let horizon = args.horizon;
    tokio::task::spawn_blocking(move || runtime.run(horizon)).await??;

    info!("final metrics:\n{}", metrics.gather_metrics()?);
    Ok(())
}

/// Resolve the configured endpoint to a store implementation. Only the
/// built-in synthetic generator ships with the CLI; real stores are
/// wired in by the embedding application.
fn build_store(config: &SkysimConfig) -> anyhow::Result<Arc<dyn Store>> {
    let Some(fleet_size) = config.store.synthetic_fleet_size() else {
        anyhow::bail!(
            "unsupported store endpoint '{}': only synthetic://fleet/<n> is built in",
            config.store.endpoint
        );
    };

    let epoch = match config.feed.mode.as_str() {
        "replay" => config.feed.replay_anchor()?,
        // Backdate the synthetic fleet so live windows see data at once.
        _ => wall_epoch() - config.feed.chunk_secs,
    };
    Ok(Arc::new(SyntheticStore::new(epoch, fleet_size)))
}
