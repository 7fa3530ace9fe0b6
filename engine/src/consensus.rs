//! Consensus price computation across sources.

use chrono::Duration;
use pricenode_common::{constants, now, CurrencyCode, Observation, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, instrument, warn};

use crate::gated_log::GatedLog;
use crate::inlier::{filter_inliers, mean};
use crate::source::Source;
use crate::transform::TransformPipeline;

/// Provider label of a rate averaged over several sources.
pub const AGGREGATE_PROVIDER: &str = "AGGREGATED";

/// Default number of standard deviations an inlier may sit from the mean.
pub const DEFAULT_DEVIATION_MULTIPLIER: Decimal = Decimal::from_parts(22, 0, 0, false, 1);

/// One published price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRate {
    #[serde(rename = "currencyCode")]
    pub currency: CurrencyCode,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Serialized as epoch milliseconds under its historical name.
    #[serde(rename = "timestampSec", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    pub provider: String,
}

impl ConsensusRate {
    /// Publish a lone observation as-is.
    pub fn from_observation(observation: &Observation) -> Self {
        Self {
            currency: observation.currency().clone(),
            price: observation.price(),
            timestamp: observation.timestamp(),
            provider: observation.source().to_string(),
        }
    }

    /// A rate averaged over several sources at `at`.
    pub fn aggregated(currency: CurrencyCode, price: Decimal, at: Timestamp) -> Self {
        Self {
            currency,
            price,
            timestamp: at,
            provider: AGGREGATE_PROVIDER.to_string(),
        }
    }

    pub fn is_aggregated(&self) -> bool {
        self.provider == AGGREGATE_PROVIDER
    }
}

/// Computes one consensus rate per currency from every source's cache.
pub struct ConsensusAggregator {
    pipeline: TransformPipeline,
    deviation_multiplier: Decimal,
    outlier_log: GatedLog,
    degenerate_log: GatedLog,
}

impl ConsensusAggregator {
    /// Create an aggregator with the default multiplier and log gate.
    pub fn new(pipeline: TransformPipeline) -> Self {
        Self {
            pipeline,
            deviation_multiplier: DEFAULT_DEVIATION_MULTIPLIER,
            outlier_log: GatedLog::new(constants::default_log_gate_interval()),
            degenerate_log: GatedLog::new(constants::default_log_gate_interval()),
        }
    }

    /// Set how many standard deviations from the mean a price may sit.
    pub fn with_deviation_multiplier(mut self, k: Decimal) -> Self {
        self.deviation_multiplier = k;
        self
    }

    /// Set the interval of the outlier diagnostics.
    pub fn with_log_gate_interval(mut self, interval: Duration) -> Self {
        self.outlier_log = GatedLog::new(interval);
        self.degenerate_log = GatedLog::new(interval);
        self
    }

    pub fn deviation_multiplier(&self) -> Decimal {
        self.deviation_multiplier
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    /// Aggregate every source's cache as of now.
    pub fn aggregate(&self, sources: &[Source]) -> BTreeMap<CurrencyCode, ConsensusRate> {
        self.aggregate_at(sources, now())
    }

    /// Aggregate every source's cache as of `now`.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub fn aggregate_at(
        &self,
        sources: &[Source],
        now: Timestamp,
    ) -> BTreeMap<CurrencyCode, ConsensusRate> {
        let mut by_currency: BTreeMap<CurrencyCode, Vec<Observation>> = BTreeMap::new();

        for source in sources {
            source.cache().evict_stale(now);
            for observation in source.cache().snapshot() {
                for routed in self.pipeline.apply(source.meta(), observation) {
                    by_currency
                        .entry(routed.currency().clone())
                        .or_default()
                        .push(routed);
                }
            }
        }

        let mut outlier_gate = None;
        let mut degenerate_gate = None;
        let mut rates = BTreeMap::new();

        for (currency, observations) in by_currency {
            debug_assert!(
                observations.iter().all(|o| o.price() > Decimal::ZERO),
                "non-positive price reached the aggregator"
            );

            let rate = match observations.as_slice() {
                [] => continue,
                [single] => ConsensusRate::from_observation(single),
                _ => {
                    let prices: Vec<Decimal> = observations.iter().map(|o| o.price()).collect();
                    let range = filter_inliers(&prices, self.deviation_multiplier);

                    if range.degenerate {
                        if *degenerate_gate.get_or_insert_with(|| self.degenerate_log.should_log(now)) {
                            error!(
                                currency = %currency,
                                lower = %range.lower,
                                upper = %range.upper,
                                "Inlier filter excluded every price, averaging all"
                            );
                        }
                    } else if range.removed(prices.len()) > 0
                        && *outlier_gate.get_or_insert_with(|| self.outlier_log.should_log(now))
                    {
                        for outlier in observations.iter().filter(|o| !range.contains(o.price())) {
                            warn!(
                                currency = %currency,
                                price = %outlier.price(),
                                provider = %outlier.source(),
                                lower = %range.lower,
                                upper = %range.upper,
                                "Removed outlier price"
                            );
                        }
                    }

                    let Some(price) = mean(&range.kept) else {
                        continue;
                    };
                    ConsensusRate::aggregated(currency.clone(), price, now)
                }
            };

            rates.insert(currency, rate);
        }

        debug!(currencies = rates.len(), "Aggregation complete");
        rates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineResult;
    use crate::source::{PriceSource, SourceMeta};
    use crate::transform::RateTransformer;
    use async_trait::async_trait;
    use pricenode_common::from_epoch_millis;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct CachedOnly {
        meta: SourceMeta,
    }

    #[async_trait]
    impl PriceSource for CachedOnly {
        fn meta(&self) -> &SourceMeta {
            &self.meta
        }

        async fn fetch(&self) -> EngineResult<Vec<Observation>> {
            Ok(Vec::new())
        }
    }

    fn source(name: &str, prices: &[(&str, Decimal, i64)]) -> Source {
        let source = Source::new(Arc::new(CachedOnly {
            meta: SourceMeta::new(name, name.to_lowercase()),
        }));
        let observations = prices.iter().map(|(code, price, millis)| {
            Observation::new(*code, *price, from_epoch_millis(*millis), name).unwrap()
        });
        source.cache().record_all(observations, from_epoch_millis(0));
        source
    }

    fn at(millis: i64) -> Timestamp {
        from_epoch_millis(millis)
    }

    #[test]
    fn test_default_multiplier() {
        assert_eq!(DEFAULT_DEVIATION_MULTIPLIER, dec!(2.2));
        let aggregator = ConsensusAggregator::new(TransformPipeline::empty());
        assert_eq!(aggregator.deviation_multiplier(), dec!(2.2));
    }

    #[test]
    fn test_single_source_is_verbatim() {
        let sources = vec![source("BITFINEX", &[("USD", dec!(65000.5), 1_000)])];
        let aggregator = ConsensusAggregator::new(TransformPipeline::empty());

        let rates = aggregator.aggregate_at(&sources, at(2_000));
        let usd = &rates[&CurrencyCode::usd()];
        assert_eq!(usd.price, dec!(65000.5));
        assert_eq!(usd.timestamp, at(1_000));
        assert_eq!(usd.provider, "BITFINEX");
        assert!(!usd.is_aggregated());
    }

    #[test]
    fn test_multi_source_mean_with_outlier_removed() {
        let sources = vec![
            source("A", &[("BRL", dec!(1.0), 1_000)]),
            source("B", &[("BRL", dec!(129000.0), 1_000)]),
            source("C", &[("BRL", dec!(131000.0), 1_000)]),
        ];
        let aggregator = ConsensusAggregator::new(TransformPipeline::empty())
            .with_deviation_multiplier(dec!(1.1));

        let rates = aggregator.aggregate_at(&sources, at(5_000));
        let brl = &rates[&CurrencyCode::new("BRL")];
        assert_eq!(brl.price, dec!(130000));
        assert_eq!(brl.timestamp, at(5_000));
        assert_eq!(brl.provider, AGGREGATE_PROVIDER);
    }

    #[test]
    fn test_all_prices_rejected_falls_back_to_plain_mean() {
        let sources = vec![
            source("A", &[("EUR", dec!(10), 1_000)]),
            source("B", &[("EUR", dec!(20), 1_000)]),
        ];
        let aggregator = ConsensusAggregator::new(TransformPipeline::empty())
            .with_deviation_multiplier(dec!(0.5));

        let rates = aggregator.aggregate_at(&sources, at(5_000));
        let eur = &rates[&CurrencyCode::eur()];
        assert_eq!(eur.price, dec!(15));
        assert_eq!(eur.provider, AGGREGATE_PROVIDER);
    }

    #[test]
    fn test_extreme_price_does_not_abort_pass() {
        let sources = vec![
            source("A", &[("USD", dec!(1), 1_000), ("EUR", dec!(90), 1_000)]),
            source("B", &[("USD", Decimal::MAX, 1_000), ("EUR", dec!(92), 1_000)]),
        ];
        let aggregator = ConsensusAggregator::new(TransformPipeline::empty());

        let rates = aggregator.aggregate_at(&sources, at(5_000));
        assert!(rates.contains_key(&CurrencyCode::usd()));
        assert_eq!(rates[&CurrencyCode::eur()].price, dec!(91));
    }

    #[test]
    fn test_sorted_and_unique_currencies() {
        let sources = vec![
            source("A", &[("USD", dec!(10), 1_000), ("EUR", dec!(9), 1_000)]),
            source("B", &[("BRL", dec!(50), 1_000), ("USD", dec!(12), 1_000)]),
        ];
        let aggregator = ConsensusAggregator::new(TransformPipeline::empty());

        let rates = aggregator.aggregate_at(&sources, at(2_000));
        let codes: Vec<&str> = rates.keys().map(|c| c.code()).collect();
        assert_eq!(codes, vec!["BRL", "EUR", "USD"]);
        assert_eq!(rates[&CurrencyCode::usd()].price, dec!(11));
    }

    #[test]
    fn test_stale_entries_are_not_aggregated() {
        let sources = vec![source("A", &[("USD", dec!(10), 0)])];
        let aggregator = ConsensusAggregator::new(TransformPipeline::empty());

        let two_hours = 2 * 60 * 60 * 1_000;
        assert!(aggregator.aggregate_at(&sources, at(two_hours)).is_empty());
        assert!(sources[0].cache().is_empty());
    }

    struct DropAll(CurrencyCode);

    impl RateTransformer for DropAll {
        fn scope_currency(&self) -> &CurrencyCode {
            &self.0
        }

        fn apply(&self, _: &SourceMeta, _: &Observation) -> Vec<Observation> {
            Vec::new()
        }
    }

    #[test]
    fn test_currency_omitted_when_transform_drops_everything() {
        let sources = vec![source("A", &[("ARS", dec!(10), 1_000), ("USD", dec!(1), 1_000)])];
        let pipeline = TransformPipeline::new(vec![Arc::new(DropAll(CurrencyCode::ars()))]);
        let aggregator = ConsensusAggregator::new(pipeline);

        let rates = aggregator.aggregate_at(&sources, at(2_000));
        assert!(!rates.contains_key(&CurrencyCode::ars()));
        assert!(rates.contains_key(&CurrencyCode::usd()));
    }

    #[test]
    fn test_rate_serialization() {
        let rate = ConsensusRate::aggregated(CurrencyCode::eur(), dec!(60000.25), at(1_700_000_000_123));
        let json = serde_json::to_value(&rate).unwrap();

        assert_eq!(json["currencyCode"], "EUR");
        assert_eq!(json["price"], 60000.25);
        assert_eq!(json["timestampSec"], 1_700_000_000_123i64);
        assert_eq!(json["provider"], "AGGREGATED");
    }
}
