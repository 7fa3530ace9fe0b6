//! Simulation metrics.

use pricenode_engine::MarketPrices;

/// Counters over the reports built during a simulation.
#[derive(Debug, Clone, Default)]
pub struct SimulationMetrics {
    /// Reports built.
    pub aggregation_passes: u64,
    /// Currencies in the latest report.
    pub currencies_published: usize,
    /// Rates published across all reports.
    pub total_rates: u64,
    /// Rates averaged over several sources across all reports.
    pub aggregated_rates: u64,
    /// Sources without current data in the latest report.
    pub degraded_sources: usize,
    /// Reports with at least one degraded source.
    pub degraded_passes: u64,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one report.
    pub fn record_pass(&mut self, report: &MarketPrices) {
        self.aggregation_passes += 1;
        self.currencies_published = report.data.len();
        self.total_rates += report.data.len() as u64;
        self.aggregated_rates += report.data.iter().filter(|r| r.is_aggregated()).count() as u64;

        self.degraded_sources = report.sources.iter().filter(|s| !s.is_live()).count();
        if self.degraded_sources > 0 {
            self.degraded_passes += 1;
        }
    }

    /// Average number of currencies per report.
    pub fn average_currencies(&self) -> f64 {
        if self.aggregation_passes == 0 {
            return 0.0;
        }
        self.total_rates as f64 / self.aggregation_passes as f64
    }

    /// Share of published rates that were aggregated.
    pub fn aggregated_share(&self) -> f64 {
        if self.total_rates == 0 {
            return 0.0;
        }
        self.aggregated_rates as f64 / self.total_rates as f64
    }
}
