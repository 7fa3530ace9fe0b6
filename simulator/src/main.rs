//! Pricenode Simulator
//!
//! Drives a price node with synthetic exchanges to observe consensus,
//! outlier filtering and staleness handling.

use clap::Parser;
use tracing::info;

mod controller;
mod metrics;
mod scenario;
mod source;

use controller::SimulationController;
use pricenode_node::{init_tracing, NodeConfig};
use scenario::Scenario;

/// Pricenode Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Pricenode consensus simulation environment")]
struct Args {
    /// Number of simulated exchanges to create
    #[arg(long, default_value = "4")]
    sources: usize,

    /// Scenario to run (steady, outliers, outage)
    #[arg(short, long)]
    scenario: Option<String>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Run duration in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0")]
    duration: u64,

    /// Seconds between logged reports
    #[arg(long, default_value = "10")]
    report_interval: u64,

    /// Seconds between polls of each exchange
    #[arg(long, default_value = "5")]
    poll_interval: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::from_env()?;
    init_tracing(&config.log_level, config.log_json)?;

    let args = Args::parse();
    if args.sources == 0 {
        anyhow::bail!("At least one source is required");
    }

    info!("Starting Pricenode Simulator");
    info!("Sources: {}", args.sources);

    let controller = SimulationController::new(
        config,
        args.sources,
        args.seed,
        chrono::Duration::seconds(args.poll_interval.max(1)),
        std::time::Duration::from_secs(args.report_interval.max(1)),
    )?;
    controller.start().await?;

    if let Some(scenario_name) = &args.scenario {
        info!("Running scenario: {}", scenario_name);

        let scenario = Scenario::load(scenario_name)?;
        controller.run_scenario(scenario).await?;
    } else {
        info!("Running in continuous mode");
        info!("Press Ctrl+C to stop");

        let duration = if args.duration > 0 {
            Some(std::time::Duration::from_secs(args.duration))
        } else {
            None
        };

        controller.run(duration).await?;
    }

    controller.stop().await?;

    let metrics = controller.metrics().await;
    info!("Simulation complete");
    info!("Reports built: {}", metrics.aggregation_passes);
    info!("Currencies in last report: {}", metrics.currencies_published);
    info!("Average currencies per report: {:.1}", metrics.average_currencies());
    info!("Aggregated share: {:.2}", metrics.aggregated_share());
    info!("Reports with degraded sources: {}", metrics.degraded_passes);

    Ok(())
}
