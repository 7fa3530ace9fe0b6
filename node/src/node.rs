//! The price node: source registry, background tasks and reports.

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use pricenode_common::CurrencyCode;
use pricenode_engine::{
    ArsBlueRateTransformer, BlueGapCache, ConsensusRate, EngineResult, GapFeed, MarketPrices,
    PriceService, PriceSource, RateTransformer, Source, TransformPipeline,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::state::NodeState;

/// Result of polling one source.
#[derive(Debug)]
pub struct PollOutcome {
    pub source: String,
    pub result: EngineResult<usize>,
}

impl PollOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Blue market gap feed and the cache it refreshes.
struct GapRefresher {
    cache: Arc<BlueGapCache>,
    feed: Arc<dyn GapFeed>,
}

/// A running price node.
pub struct PriceNode {
    config: NodeConfig,
    node_id: String,
    state: Arc<RwLock<NodeState>>,
    service: Arc<PriceService>,
    gap: Option<GapRefresher>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PriceNode {
    /// Create a node over `sources`, in report order.
    ///
    /// With a gap feed, an ARS blue market transformer is added ahead of
    /// `transformers`.
    pub fn new(
        config: NodeConfig,
        sources: Vec<Arc<dyn PriceSource>>,
        transformers: Vec<Arc<dyn RateTransformer>>,
        gap_feed: Option<Arc<dyn GapFeed>>,
    ) -> NodeResult<Self> {
        config.validate()?;

        let gap = gap_feed.map(|feed| GapRefresher {
            cache: Arc::new(BlueGapCache::new()),
            feed,
        });

        let mut pipeline = TransformPipeline::empty();
        if let Some(gap) = &gap {
            pipeline = pipeline.with_transformer(Arc::new(ArsBlueRateTransformer::new(gap.cache.clone())));
        }
        for transformer in transformers {
            pipeline = pipeline.with_transformer(transformer);
        }

        let sources = sources.into_iter().map(Source::new).collect();
        let service = PriceService::new(sources, pipeline, &config.engine)?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            node_id: config.resolve_node_id(),
            config,
            state: Arc::new(RwLock::new(NodeState::Starting)),
            service: Arc::new(service),
            gap,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn builder(config: NodeConfig) -> PriceNodeBuilder {
        PriceNodeBuilder::new(config)
    }

    /// Start polling every source and refreshing the blue market gap.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn start(&self) -> NodeResult<()> {
        let state = self.state();
        if state != NodeState::Starting {
            return Err(NodeError::InvalidState(state));
        }
        info!(sources = self.service.sources().len(), "Starting price node");

        if self.config.poll_on_start {
            let outcomes = self.poll_all_once().await;
            let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
            info!(polled = outcomes.len(), failed, "Initial poll complete");

            if let Err(e) = self.refresh_gap_once().await {
                warn!(error = %e, "Initial blue market gap refresh failed");
            }
        }

        let mut tasks = self.tasks.lock();
        for poller in self.service.pollers() {
            tasks.push(tokio::spawn(poller.run(self.shutdown_tx.subscribe())));
        }

        if let Some(gap) = &self.gap {
            tasks.push(tokio::spawn(gap.cache.clone().run_refresh_loop(
                gap.feed.clone(),
                self.config.gap_refresh_interval,
                self.shutdown_tx.subscribe(),
            )));
        }
        drop(tasks);

        *self.state.write() = NodeState::Running;
        info!("Price node running");
        Ok(())
    }

    /// Signal shutdown and stop every background task.
    #[instrument(skip(self), fields(node_id = %self.node_id))]
    pub async fn stop(&self) -> NodeResult<()> {
        let state = self.state();
        if state.is_terminal() {
            return Err(NodeError::InvalidState(state));
        }
        info!("Stopping price node");
        *self.state.write() = NodeState::ShuttingDown;

        if self.shutdown_tx.send(true).is_err() {
            warn!("No background task was listening for shutdown");
        }

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in &tasks {
            task.abort();
        }
        for result in join_all(tasks).await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    error!(error = %e, "Background task failed");
                }
            }
        }

        *self.state.write() = NodeState::Stopped;
        info!("Price node stopped");
        Ok(())
    }

    /// Fetch from every source once, concurrently.
    pub async fn poll_all_once(&self) -> Vec<PollOutcome> {
        let pollers = self.service.pollers();
        let polls = pollers.iter().map(|poller| async move {
            let result = poller.poll_once().await;
            if let Err(e) = &result {
                warn!(source = %poller.source().name(), error = %e, "Poll failed");
            }
            PollOutcome {
                source: poller.source().name().to_string(),
                result,
            }
        });
        join_all(polls).await
    }

    /// Refresh the blue market gap once, if a feed is configured.
    pub async fn refresh_gap_once(&self) -> NodeResult<Option<Decimal>> {
        match &self.gap {
            Some(gap) => Ok(Some(gap.cache.refresh_once(gap.feed.as_ref()).await?)),
            None => Ok(None),
        }
    }

    /// Current market price report.
    pub fn market_prices(&self) -> MarketPrices {
        self.service.market_prices()
    }

    /// Current consensus rates only.
    pub fn aggregate(&self) -> BTreeMap<CurrencyCode, ConsensusRate> {
        self.service.aggregate()
    }

    pub fn service(&self) -> &Arc<PriceService> {
        &self.service
    }

    pub fn blue_gap(&self) -> Option<&Arc<BlueGapCache>> {
        self.gap.as_ref().map(|g| &g.cache)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    /// Number of background tasks currently held.
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }
}

/// Collects sources and transformers before building a [`PriceNode`].
pub struct PriceNodeBuilder {
    config: NodeConfig,
    sources: Vec<Arc<dyn PriceSource>>,
    transformers: Vec<Arc<dyn RateTransformer>>,
    gap_feed: Option<Arc<dyn GapFeed>>,
}

impl PriceNodeBuilder {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            sources: Vec::new(),
            transformers: Vec::new(),
            gap_feed: None,
        }
    }

    /// Register a source. Registration order is report order.
    pub fn source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn transformer(mut self, transformer: Arc<dyn RateTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    /// Enable the ARS blue market adjustment fed by `feed`.
    pub fn blue_gap_feed(mut self, feed: Arc<dyn GapFeed>) -> Self {
        self.gap_feed = Some(feed);
        self
    }

    pub fn build(self) -> NodeResult<PriceNode> {
        PriceNode::new(self.config, self.sources, self.transformers, self.gap_feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use pricenode_common::{now, Observation};
    use pricenode_engine::{EngineError, SourceMeta};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        meta: SourceMeta,
        prices: Vec<(&'static str, Decimal)>,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn new(name: &str, prices: Vec<(&'static str, Decimal)>) -> Arc<Self> {
            Arc::new(Self {
                meta: SourceMeta::new(name, name.to_lowercase())
                    .with_poll_interval(Duration::seconds(60)),
                prices,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        fn meta(&self) -> &SourceMeta {
            &self.meta
        }

        async fn fetch(&self) -> EngineResult<Vec<Observation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prices
                .iter()
                .map(|(code, price)| Ok(Observation::new(*code, *price, now(), &self.meta.name)?))
                .collect()
        }
    }

    struct FixedGap(Decimal);

    #[async_trait]
    impl GapFeed for FixedGap {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch_sell_gap(&self) -> EngineResult<Decimal> {
            Ok(self.0)
        }
    }

    struct DownGap;

    #[async_trait]
    impl GapFeed for DownGap {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_sell_gap(&self) -> EngineResult<Decimal> {
            Err(EngineError::GapUnavailable)
        }
    }

    fn quiet_config() -> NodeConfig {
        NodeConfig {
            node_id: Some("test-node".to_string()),
            poll_on_start: false,
            ..NodeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_node_creation() {
        let node = PriceNode::builder(quiet_config())
            .source(CountingSource::new("KRAKEN", vec![("USD", dec!(60000))]))
            .build()
            .unwrap();

        assert_eq!(node.state(), NodeState::Starting);
        assert_eq!(node.node_id(), "test-node");
        assert!(node.blue_gap().is_none());
        assert_eq!(node.market_prices().field_count(), 3);
    }

    #[tokio::test]
    async fn test_start_stop() {
        let source = CountingSource::new("KRAKEN", vec![("USD", dec!(60000))]);
        let node = PriceNode::builder(NodeConfig::default())
            .source(source.clone())
            .blue_gap_feed(Arc::new(FixedGap(dec!(2))))
            .build()
            .unwrap();

        node.start().await.unwrap();
        assert_eq!(node.state(), NodeState::Running);
        assert_eq!(node.task_count(), 2);
        assert!(source.calls.load(Ordering::SeqCst) >= 1);
        assert!(node.aggregate().contains_key(&CurrencyCode::usd()));
        assert!(matches!(node.start().await, Err(NodeError::InvalidState(NodeState::Running))));

        node.stop().await.unwrap();
        assert_eq!(node.state(), NodeState::Stopped);
        assert_eq!(node.task_count(), 0);
        assert!(node.stop().await.is_err());
    }

    #[tokio::test]
    async fn test_poll_all_once_reports_each_source() {
        let node = PriceNode::builder(quiet_config())
            .source(CountingSource::new("BITSTAMP", vec![("USD", dec!(100)), ("EUR", dec!(90))]))
            .source(CountingSource::new("KRAKEN", vec![("USD", dec!(104))]))
            .build()
            .unwrap();

        let outcomes = node.poll_all_once().await;
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].source, "BITSTAMP");
        assert_eq!(outcomes[0].result.as_ref().unwrap(), &2);

        let rates = node.aggregate();
        assert_eq!(rates[&CurrencyCode::usd()].price, dec!(102));
    }

    #[tokio::test]
    async fn test_gap_feed_adjusts_ars() {
        let node = PriceNode::builder(quiet_config())
            .source(CountingSource::new("BITSO", vec![("ARS", dec!(1000))]))
            .blue_gap_feed(Arc::new(FixedGap(dec!(1.5))))
            .build()
            .unwrap();
        node.poll_all_once().await;

        // No gap yet: the official ARS price is withheld.
        assert!(node.market_prices().data.is_empty());

        assert_eq!(node.refresh_gap_once().await.unwrap(), Some(dec!(1.5)));
        let report = node.market_prices();
        assert_eq!(report.rate(&CurrencyCode::ars()).unwrap().price, dec!(1500));
    }

    #[tokio::test]
    async fn test_gap_failure_surfaces_from_refresh() {
        let node = PriceNode::builder(quiet_config())
            .blue_gap_feed(Arc::new(DownGap))
            .build()
            .unwrap();

        let err = node.refresh_gap_once().await.unwrap_err();
        assert_eq!(err.error_code(), "ENGINE_ERROR");
        assert!(node.blue_gap().unwrap().multiplier().is_none());
    }

    #[tokio::test]
    async fn test_report_json_shape() {
        let node = PriceNode::builder(quiet_config())
            .source(CountingSource::new("COINGECKO", vec![("BRL", dec!(300000))]))
            .source(CountingSource::new("BINANCE", vec![]))
            .build()
            .unwrap();
        node.poll_all_once().await;

        let json: serde_json::Value =
            serde_json::from_str(&node.market_prices().to_json().unwrap()).unwrap();
        assert_eq!(json["coingeckoCount"], 1);
        assert_eq!(json["binanceTs"], 0);
        assert_eq!(json["data"][0]["currencyCode"], "BRL");
        assert_eq!(json["data"][0]["provider"], "COINGECKO");
    }

    #[test]
    fn test_duplicate_sources_rejected() {
        let result = PriceNode::builder(quiet_config())
            .source(CountingSource::new("KRAKEN", vec![]))
            .source(CountingSource::new("KRAKEN", vec![]))
            .build();
        assert!(matches!(result, Err(NodeError::Engine(EngineError::DuplicateSource(_)))));
    }

    #[test]
    fn test_stop_before_start_on_runtime() {
        let node = PriceNode::builder(quiet_config()).build().unwrap();
        tokio_test::block_on(node.stop()).unwrap();
        assert!(node.state().is_terminal());
    }
}
