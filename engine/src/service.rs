//! The consensus engine facade: registered sources plus the report builder.

use chrono::Duration;
use pricenode_common::{now, CurrencyCode, Timestamp};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::consensus::{ConsensusAggregator, ConsensusRate};
use crate::error::{EngineError, EngineResult};
use crate::exclusion::CurrencyExclusions;
use crate::health::HealthReporter;
use crate::poller::SourcePoller;
use crate::report::MarketPrices;
use crate::source::Source;
use crate::transform::TransformPipeline;

/// Registry of sources and the aggregation over their caches.
pub struct PriceService {
    sources: Vec<Source>,
    aggregator: ConsensusAggregator,
    health: HealthReporter,
    exclusions: Arc<CurrencyExclusions>,
    fetch_timeout: Duration,
}

impl PriceService {
    /// Create a service over `sources`, in the order they appear in reports.
    pub fn new(
        sources: Vec<Source>,
        pipeline: TransformPipeline,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        validate_sources(&sources)?;

        let aggregator = ConsensusAggregator::new(pipeline)
            .with_deviation_multiplier(config.deviation_multiplier)
            .with_log_gate_interval(config.log_gate_interval);

        info!(
            sources = sources.len(),
            transformers = aggregator.pipeline().len(),
            deviation_multiplier = %config.deviation_multiplier,
            "Price service created"
        );

        Ok(Self {
            sources,
            aggregator,
            health: HealthReporter::new(),
            exclusions: Arc::new(config.exclusions.clone()),
            fetch_timeout: config.fetch_timeout,
        })
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Look up a source by name, ignoring case.
    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// One poller per source, sharing the configured exclusions and timeout.
    pub fn pollers(&self) -> Vec<SourcePoller> {
        self.sources
            .iter()
            .map(|s| SourcePoller::new(s.clone(), self.exclusions.clone(), self.fetch_timeout))
            .collect()
    }

    pub fn aggregate(&self) -> BTreeMap<CurrencyCode, ConsensusRate> {
        self.aggregator.aggregate(&self.sources)
    }

    pub fn aggregate_at(&self, now: Timestamp) -> BTreeMap<CurrencyCode, ConsensusRate> {
        self.aggregator.aggregate_at(&self.sources, now)
    }

    /// Build the published report as of now.
    pub fn market_prices(&self) -> MarketPrices {
        self.market_prices_at(now())
    }

    /// Build the published report as of `now`.
    #[instrument(skip(self))]
    pub fn market_prices_at(&self, now: Timestamp) -> MarketPrices {
        let health = self.health.report_at(&self.sources, now);
        let data = self.aggregator.aggregate_at(&self.sources, now).into_values().collect();
        MarketPrices::new(health, data)
    }
}

fn validate_sources(sources: &[Source]) -> EngineResult<()> {
    let mut names = HashSet::new();
    let mut prefixes = HashSet::new();

    for source in sources {
        let meta = source.meta();
        if meta.name.trim().is_empty() || meta.prefix.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "Source name and prefix cannot be empty".to_string(),
            ));
        }
        if !names.insert(meta.name.to_uppercase()) {
            return Err(EngineError::DuplicateSource(meta.name.clone()));
        }
        if !prefixes.insert(meta.prefix.clone()) {
            return Err(EngineError::DuplicateSource(meta.prefix.clone()));
        }
        if meta.poll_interval <= Duration::zero() {
            return Err(EngineError::InvalidConfig(format!(
                "Poll interval of {} must be positive",
                meta.name
            )));
        }
        if meta.staleness_window <= Duration::zero() {
            return Err(EngineError::InvalidConfig(format!(
                "Staleness window of {} must be positive",
                meta.name
            )));
        }
    }

    Ok(())
}
