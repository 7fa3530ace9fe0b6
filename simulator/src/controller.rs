//! Simulation controller.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use pricenode_engine::{MarketPrices, PriceSource};
use pricenode_node::{NodeConfig, PriceNode};

use crate::metrics::SimulationMetrics;
use crate::scenario::{FaultType, Scenario, ScenarioStep, GAP_TARGET};
use crate::source::{SimulatedGapFeed, SimulatedSource, SourceFactory};

/// Controls the simulation.
pub struct SimulationController {
    /// Node under simulation.
    node: Arc<PriceNode>,
    /// Simulated sources, in registration order.
    sources: Vec<Arc<SimulatedSource>>,
    /// Simulated blue market gap feed.
    gap_feed: Arc<SimulatedGapFeed>,
    /// Interval between periodic reports.
    report_interval: Duration,
    /// Simulation metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
}

impl SimulationController {
    /// Create a controller with `source_count` simulated exchanges.
    pub fn new(
        config: NodeConfig,
        source_count: usize,
        seed: Option<u64>,
        poll_interval: chrono::Duration,
        report_interval: Duration,
    ) -> anyhow::Result<Self> {
        let seed = seed.unwrap_or_else(rand::random);
        info!(seed, source_count, "Creating simulated sources");

        let sources = SourceFactory::create_sources(source_count, seed, poll_interval);
        let gap_feed = Arc::new(SimulatedGapFeed::new(Decimal::new(195, 2), 50, seed));

        let node = sources
            .iter()
            .fold(PriceNode::builder(config), |builder, source| {
                builder.source(source.clone() as Arc<dyn PriceSource>)
            })
            .blue_gap_feed(gap_feed.clone())
            .build()?;

        Ok(Self {
            node: Arc::new(node),
            sources,
            gap_feed,
            report_interval,
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
        })
    }

    /// Start the node's background tasks.
    pub async fn start(&self) -> anyhow::Result<()> {
        self.node.start().await?;
        Ok(())
    }

    /// Stop the node.
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.node.stop().await?;
        Ok(())
    }

    /// Run a scenario.
    pub async fn run_scenario(&self, scenario: Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        for step in &scenario.steps {
            self.execute_step(step).await?;
        }

        Ok(())
    }

    /// Report periodically until `duration` elapses or Ctrl+C.
    pub async fn run(&self, duration: Option<Duration>) -> anyhow::Result<()> {
        info!("Running simulation in continuous mode");

        let mut ticker = tokio::time::interval(self.report_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let deadline = async {
            match duration {
                Some(d) => tokio::time::sleep(d).await,
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "Failed to listen for Ctrl+C");
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.snapshot().await?;
                }
                _ = &mut deadline => break,
            }
        }

        Ok(())
    }

    /// Build a report, log it and record it in the metrics.
    pub async fn snapshot(&self) -> anyhow::Result<MarketPrices> {
        let report = self.node.market_prices();
        self.metrics.write().await.record_pass(&report);

        let degraded: Vec<&str> = report
            .sources
            .iter()
            .filter(|s| !s.is_live())
            .map(|s| s.name.as_str())
            .collect();
        info!(
            currencies = report.data.len(),
            degraded = ?degraded,
            report = %report.to_json()?,
            "Market prices"
        );

        Ok(report)
    }

    /// Execute a single scenario step.
    async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::Wait { seconds } => {
                info!("Waiting {} seconds", seconds);
                tokio::time::sleep(Duration::from_secs(*seconds)).await;
            }
            ScenarioStep::InjectFault { fault_type, target } => {
                info!("Injecting fault {:?} on {}", fault_type, target);
                if target == GAP_TARGET {
                    if matches!(fault_type, FaultType::Outage) {
                        self.gap_feed.set_offline(true);
                    } else {
                        warn!("Only outages apply to the gap feed");
                    }
                } else if let Some(source) = self.find_source(target) {
                    match fault_type {
                        FaultType::Outage => source.set_offline(true),
                        FaultType::OutlierBurst { probability } => {
                            source.set_outlier_probability(*probability)
                        }
                    }
                } else {
                    warn!("Source not found: {}", target);
                }
            }
            ScenarioStep::ClearFault { target } => {
                info!("Clearing fault on {}", target);
                if target == GAP_TARGET {
                    self.gap_feed.set_offline(false);
                } else if let Some(source) = self.find_source(target) {
                    source.clear_faults();
                } else {
                    warn!("Source not found: {}", target);
                }
            }
            ScenarioStep::Snapshot => {
                self.snapshot().await?;
            }
        }

        Ok(())
    }

    fn find_source(&self, name: &str) -> Option<&Arc<SimulatedSource>> {
        self.sources.iter().find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Get simulation metrics.
    pub async fn metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }
}
