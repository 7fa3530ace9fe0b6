//! Per-source polling loop.

use chrono::Duration;
use pricenode_common::{now, DurationExt, Observation};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::error::{EngineError, EngineResult};
use crate::exclusion::CurrencyExclusions;
use crate::source::Source;

/// Polls one source on its own schedule and fills its cache.
#[derive(Clone)]
pub struct SourcePoller {
    source: Source,
    exclusions: Arc<CurrencyExclusions>,
    fetch_timeout: Duration,
}

impl SourcePoller {
    pub fn new(source: Source, exclusions: Arc<CurrencyExclusions>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            exclusions,
            fetch_timeout,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Whether an observation may enter the cache.
    fn admit(&self, observation: &Observation) -> bool {
        let meta = self.source.meta();
        let currency = observation.currency();

        if self.exclusions.is_excluded(&meta.name, currency) {
            debug!(source = %meta.name, currency = %currency, "Dropping excluded currency");
            return false;
        }
        if !meta.accept_unlisted_currencies && !currency.is_known() {
            debug!(source = %meta.name, currency = %currency, "Dropping unsupported currency");
            return false;
        }
        true
    }

    /// Fetch once and record the admitted observations.
    ///
    /// Returns how many were recorded. On any failure the cache is untouched.
    #[instrument(skip(self), fields(source = %self.source.name()))]
    pub async fn poll_once(&self) -> EngineResult<usize> {
        let name = self.source.name().to_string();
        let fetch = self.source.provider().fetch();

        let fetched = match tokio::time::timeout(self.fetch_timeout.as_std(), fetch).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EngineError::FetchTimeout {
                    name,
                    timeout_ms: self.fetch_timeout.num_milliseconds().max(0) as u64,
                })
            }
        };

        if fetched.is_empty() {
            warn!("Source returned no prices, keeping cached data");
            return Ok(0);
        }

        let total = fetched.len();
        let admitted: Vec<Observation> = fetched.into_iter().filter(|o| self.admit(o)).collect();
        let recorded = admitted.len();
        self.source.cache().record_all(admitted, now());

        debug!(fetched = total, recorded, "Poll complete");
        Ok(recorded)
    }

    /// Poll every interval until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let meta = self.source.meta().clone();
        let period = meta
            .poll_interval
            .as_std()
            .max(std::time::Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(source = %meta.name, interval_ms = meta.poll_interval.num_milliseconds(), "Poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(source = %meta.name, error = %e, transient = e.is_transient(), "Poll failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(source = %meta.name, "Poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{PriceSource, SourceMeta};
    use async_trait::async_trait;
    use pricenode_common::CurrencyCode;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Prices(Vec<(&'static str, rust_decimal::Decimal)>),
        Fail,
        Hang,
    }

    struct ScriptedSource {
        meta: SourceMeta,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(meta: SourceMeta, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                meta,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        fn meta(&self) -> &SourceMeta {
            &self.meta
        }

        async fn fetch(&self) -> EngineResult<Vec<Observation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Prices(prices) => prices
                    .iter()
                    .map(|(code, price)| {
                        Observation::new(*code, *price, now(), &self.meta.name).map_err(Into::into)
                    })
                    .collect(),
                Behaviour::Fail => Err(EngineError::SourceFetchFailure {
                    name: self.meta.name.clone(),
                    reason: "HTTP 503".to_string(),
                }),
                Behaviour::Hang => {
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn poller(source: Arc<ScriptedSource>, exclusions: CurrencyExclusions) -> SourcePoller {
        SourcePoller::new(Source::new(source), Arc::new(exclusions), Duration::seconds(1))
    }

    #[tokio::test]
    async fn test_poll_records_admitted_prices() {
        let source = ScriptedSource::new(
            SourceMeta::new("HUOBI", "huobi"),
            Behaviour::Prices(vec![
                ("USD", dec!(60000)),
                ("BRL", dec!(300000)),
                ("LBP", dec!(9)),
                ("DUM", dec!(1)),
            ]),
        );
        let exclusions = CurrencyExclusions::parse("LBP", "HUOBI:BRL").unwrap();
        let poller = poller(source, exclusions);

        assert_eq!(poller.poll_once().await.unwrap(), 1);
        let cache = poller.source().cache();
        assert!(cache.get(&CurrencyCode::usd()).is_some());
        assert!(cache.get(&CurrencyCode::new("BRL")).is_none());
        assert!(cache.get(&CurrencyCode::new("LBP")).is_none());
        assert!(cache.get(&CurrencyCode::new("DUM")).is_none());
    }

    #[tokio::test]
    async fn test_unlisted_currencies_allowed_when_declared() {
        let source = ScriptedSource::new(
            SourceMeta::new("SYNTH", "synth").with_unlisted_currencies(true),
            Behaviour::Prices(vec![("DUM", dec!(1))]),
        );
        let poller = poller(source, CurrencyExclusions::none());
        assert_eq!(poller.poll_once().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_untouched() {
        let source = ScriptedSource::new(SourceMeta::new("KRAKEN", "kraken"), Behaviour::Fail);
        let poller = poller(source, CurrencyExclusions::none());
        poller.source().cache().record(
            Observation::new("USD", dec!(1), now(), "KRAKEN").unwrap(),
        );

        let err = poller.poll_once().await.unwrap_err();
        assert!(matches!(err, EngineError::SourceFetchFailure { .. }));
        assert_eq!(poller.source().cache().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_fetch_keeps_cache() {
        let source = ScriptedSource::new(SourceMeta::new("KRAKEN", "kraken"), Behaviour::Prices(vec![]));
        let poller = poller(source, CurrencyExclusions::none());
        poller.source().cache().record(
            Observation::new("EUR", dec!(1), now(), "KRAKEN").unwrap(),
        );

        assert_eq!(poller.poll_once().await.unwrap(), 0);
        assert_eq!(poller.source().cache().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout() {
        let source = ScriptedSource::new(SourceMeta::new("SLOW", "slow"), Behaviour::Hang);
        let poller = poller(source, CurrencyExclusions::none());

        match poller.poll_once().await {
            Err(EngineError::FetchTimeout { name, timeout_ms }) => {
                assert_eq!(name, "SLOW");
                assert_eq!(timeout_ms, 1_000);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_shutdown() {
        let source = ScriptedSource::new(
            SourceMeta::new("BITSTAMP", "bitstamp").with_poll_interval(Duration::seconds(10)),
            Behaviour::Prices(vec![("USD", dec!(60000))]),
        );
        let poller = poller(source.clone(), CurrencyExclusions::none());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(rx));
        tokio::time::sleep(std::time::Duration::from_secs(25)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }
}
