//! The contract every upstream price feed implements.

use async_trait::async_trait;
use chrono::Duration;
use pricenode_common::{constants, Observation};
use std::fmt;
use std::sync::Arc;

use crate::cache::SourceCache;
use crate::error::EngineResult;

/// Static description of a price source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMeta {
    /// Label carried by this source's own observations.
    pub name: String,
    /// Prefix of this source's health fields in the report.
    pub prefix: String,
    pub poll_interval: Duration,
    pub staleness_window: Duration,
    /// Source already quotes the unofficial rate for capital-controlled currencies.
    pub reports_blue_rate: bool,
    /// Keep codes missing from the known fiat and crypto lists.
    pub accept_unlisted_currencies: bool,
}

impl SourceMeta {
    /// Create metadata with default intervals.
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            poll_interval: constants::default_poll_interval(),
            staleness_window: constants::default_staleness_window(),
            reports_blue_rate: false,
            accept_unlisted_currencies: false,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_blue_rate(mut self, reports_blue_rate: bool) -> Self {
        self.reports_blue_rate = reports_blue_rate;
        self
    }

    pub fn with_unlisted_currencies(mut self, accept: bool) -> Self {
        self.accept_unlisted_currencies = accept;
        self
    }
}

/// Trait for upstream price feeds.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Get the source metadata.
    fn meta(&self) -> &SourceMeta;

    /// Fetch the current prices. An empty vector means no data this round.
    async fn fetch(&self) -> EngineResult<Vec<Observation>>;
}

/// A registered source: the feed plus the cache its poller fills.
#[derive(Clone)]
pub struct Source {
    provider: Arc<dyn PriceSource>,
    cache: Arc<SourceCache>,
}

impl Source {
    pub fn new(provider: Arc<dyn PriceSource>) -> Self {
        let cache = Arc::new(SourceCache::new(provider.meta().staleness_window));
        Self { provider, cache }
    }

    pub fn meta(&self) -> &SourceMeta {
        self.provider.meta()
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn provider(&self) -> &Arc<dyn PriceSource> {
        &self.provider
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("meta", self.meta())
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricenode_common::now;
    use rust_decimal_macros::dec;

    struct FixedSource {
        meta: SourceMeta,
    }

    #[async_trait]
    impl PriceSource for FixedSource {
        fn meta(&self) -> &SourceMeta {
            &self.meta
        }

        async fn fetch(&self) -> EngineResult<Vec<Observation>> {
            Ok(vec![Observation::new("USD", dec!(1), now(), &self.meta.name)?])
        }
    }

    #[test]
    fn test_meta_builders() {
        let meta = SourceMeta::new("BITSO", "btcAverage")
            .with_poll_interval(Duration::seconds(5))
            .with_staleness_window(Duration::minutes(10))
            .with_blue_rate(true);

        assert_eq!(meta.poll_interval, Duration::seconds(5));
        assert_eq!(meta.staleness_window, Duration::minutes(10));
        assert!(meta.reports_blue_rate);
        assert!(!meta.accept_unlisted_currencies);
    }

    #[tokio::test]
    async fn test_source_shares_cache_across_clones() {
        let provider = Arc::new(FixedSource {
            meta: SourceMeta::new("KRAKEN", "kraken").with_staleness_window(Duration::minutes(3)),
        });
        let source = Source::new(provider);
        let clone = source.clone();

        let fetched = source.provider().fetch().await.unwrap();
        source.cache().record_all(fetched, now());

        assert_eq!(clone.cache().len(), 1);
        assert_eq!(clone.cache().staleness_window(), Duration::minutes(3));
        assert_eq!(clone.name(), "KRAKEN");
    }
}
