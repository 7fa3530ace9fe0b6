//! Synthetic price sources and gap feed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use pricenode_common::{now, CurrencyCode, Observation};
use pricenode_engine::{EngineError, EngineResult, GapFeed, PriceSource, SourceMeta};

/// Names of the simulated exchanges, in registration order.
const EXCHANGES: &[&str] = &[
    "BITSTAMP", "KRAKEN", "COINGECKO", "BINANCE", "BITFINEX", "POLONIEX", "BITSO", "CRYPTOYA",
];

/// Exchange that already quotes the blue market ARS rate.
const BLUE_RATE_EXCHANGE: &str = "CRYPTOYA";

/// Starting prices of BTC in each simulated currency.
fn base_prices() -> Vec<(CurrencyCode, Decimal)> {
    [
        ("USD", Decimal::new(60_000, 0)),
        ("EUR", Decimal::new(55_000, 0)),
        ("GBP", Decimal::new(48_000, 0)),
        ("BRL", Decimal::new(300_000, 0)),
        ("JPY", Decimal::new(9_000_000, 0)),
        ("ARS", Decimal::new(20_000_000, 0)),
        ("ETH", Decimal::new(55, 3)),
        ("XMR", Decimal::new(25, 4)),
    ]
    .into_iter()
    .map(|(code, price)| (CurrencyCode::new(code), price))
    .collect()
}

/// Random-walk state of one source.
struct WalkState {
    rng: StdRng,
    prices: BTreeMap<CurrencyCode, Decimal>,
}

/// A price source producing noisy random-walk prices.
pub struct SimulatedSource {
    meta: SourceMeta,
    state: Mutex<WalkState>,
    /// Per-step noise in basis points.
    volatility_bps: i64,
    /// Chance of an outlier, in basis points.
    outlier_bps: AtomicU32,
    offline: AtomicBool,
}

impl SimulatedSource {
    pub fn new(meta: SourceMeta, seed: u64, volatility_bps: i64) -> Self {
        Self {
            meta,
            state: Mutex::new(WalkState {
                rng: StdRng::seed_from_u64(seed),
                prices: base_prices().into_iter().collect(),
            }),
            volatility_bps: volatility_bps.max(0),
            outlier_bps: AtomicU32::new(0),
            offline: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Take the source offline or bring it back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Probability, in 0.0..=1.0, that a price is reported far off the walk.
    pub fn set_outlier_probability(&self, probability: f64) {
        let bps = (probability.clamp(0.0, 1.0) * 10_000.0).round() as u32;
        self.outlier_bps.store(bps, Ordering::SeqCst);
    }

    /// Restore normal operation.
    pub fn clear_faults(&self) {
        self.set_offline(false);
        self.outlier_bps.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl PriceSource for SimulatedSource {
    fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    async fn fetch(&self) -> EngineResult<Vec<Observation>> {
        if self.is_offline() {
            return Err(EngineError::SourceFetchFailure {
                name: self.meta.name.clone(),
                reason: "simulated outage".to_string(),
            });
        }

        let outlier_bps = self.outlier_bps.load(Ordering::SeqCst);
        let timestamp = now();
        let mut state = self.state.lock().await;
        let WalkState { rng, prices } = &mut *state;

        let mut observations = Vec::with_capacity(prices.len());
        for (currency, price) in prices.iter_mut() {
            let step = rng.gen_range(-self.volatility_bps..=self.volatility_bps);
            *price = (*price * (Decimal::ONE + Decimal::new(step, 4))).round_dp(8);

            let mut reported = *price;
            if outlier_bps > 0 && rng.gen_range(0..10_000) < outlier_bps {
                // 25% off the walk, either direction.
                let skew = if rng.gen_bool(0.5) {
                    Decimal::new(125, 2)
                } else {
                    Decimal::new(75, 2)
                };
                reported = (reported * skew).round_dp(8);
            }

            observations.push(Observation::new(
                currency.clone(),
                reported,
                timestamp,
                self.meta.name.as_str(),
            )?);
        }

        Ok(observations)
    }
}

/// Creates the simulated exchange set.
pub struct SourceFactory;

impl SourceFactory {
    /// Create `count` sources polled every `poll_interval`, evicting after three missed polls.
    pub fn create_sources(count: usize, seed: u64, poll_interval: Duration) -> Vec<Arc<SimulatedSource>> {
        (0..count)
            .map(|i| {
                let base = EXCHANGES[i % EXCHANGES.len()];
                let round = i / EXCHANGES.len();
                let name = if round == 0 {
                    base.to_string()
                } else {
                    format!("{base}{round}")
                };
                let prefix = name.to_lowercase();

                let meta = SourceMeta::new(name.clone(), prefix)
                    .with_poll_interval(poll_interval)
                    .with_staleness_window(poll_interval * 3)
                    .with_blue_rate(base == BLUE_RATE_EXCHANGE);

                Arc::new(SimulatedSource::new(meta, seed.wrapping_add(i as u64), 15))
            })
            .collect()
    }
}

/// A gap feed returning a fixed multiplier with jitter.
pub struct SimulatedGapFeed {
    multiplier: Decimal,
    jitter_bps: i64,
    rng: Mutex<StdRng>,
    offline: AtomicBool,
}

impl SimulatedGapFeed {
    pub fn new(multiplier: Decimal, jitter_bps: i64, seed: u64) -> Self {
        Self {
            multiplier,
            jitter_bps: jitter_bps.max(0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl GapFeed for SimulatedGapFeed {
    fn name(&self) -> &str {
        "simulated-bluelytics"
    }

    async fn fetch_sell_gap(&self) -> EngineResult<Decimal> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EngineError::GapUnavailable);
        }
        let step = self.rng.lock().await.gen_range(-self.jitter_bps..=self.jitter_bps);
        Ok((self.multiplier * (Decimal::ONE + Decimal::new(step, 4))).round_dp(6))
    }
}
