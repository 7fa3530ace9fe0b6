//! Blue market adjustment for ARS.
//!
//! Argentina's official exchange rate differs from the rate trades actually
//! clear at. Sources quoting the official rate have their ARS prices scaled by
//! the sell gap `blue sell / official sell`, refreshed hourly from an upstream
//! feed. Until a gap is known, their ARS prices are withheld.

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::RwLock;
use pricenode_common::{now, CurrencyCode, DurationExt, Observation, Timestamp};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::source::SourceMeta;
use crate::transform::RateTransformer;

/// Upstream of the blue market sell gap.
#[async_trait]
pub trait GapFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the current `blue sell / official sell` multiplier.
    async fn fetch_sell_gap(&self) -> EngineResult<Decimal>;
}

/// A gap multiplier and when it was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapReading {
    pub multiplier: Decimal,
    pub fetched_at: Timestamp,
}

/// Latest known blue market gap, shared between the refresher and transformers.
#[derive(Debug, Default)]
pub struct BlueGapCache {
    reading: RwLock<Option<GapReading>>,
}

impl BlueGapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<GapReading> {
        *self.reading.read()
    }

    pub fn multiplier(&self) -> Option<Decimal> {
        self.current().map(|r| r.multiplier)
    }

    /// Store a multiplier. Non-positive values are rejected.
    pub fn set(&self, multiplier: Decimal, at: Timestamp) -> EngineResult<()> {
        if multiplier <= Decimal::ZERO {
            return Err(EngineError::MalformedResponse {
                name: "blue gap".to_string(),
                reason: format!("non-positive multiplier {multiplier}"),
            });
        }
        *self.reading.write() = Some(GapReading {
            multiplier,
            fetched_at: at,
        });
        Ok(())
    }

    /// Fetch once from `feed`. On failure the previous reading is kept.
    pub async fn refresh_once(&self, feed: &dyn GapFeed) -> EngineResult<Decimal> {
        let multiplier = feed.fetch_sell_gap().await?;
        self.set(multiplier, now())?;
        info!(feed = feed.name(), multiplier = %multiplier, "Refreshed blue market gap");
        Ok(multiplier)
    }

    /// Refresh every `interval` until `shutdown` flips to true.
    pub async fn run_refresh_loop(
        self: Arc<Self>,
        feed: Arc<dyn GapFeed>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let period = interval.as_std().max(std::time::Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh_once(feed.as_ref()).await {
                        error!(feed = feed.name(), error = %e, "Failed to refresh blue market gap");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(feed = feed.name(), "Blue gap refresher stopping");
                        break;
                    }
                }
            }
        }
    }
}

/// One side-by-side USD quote in the upstream payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UsdRate {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub value_avg: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub value_sell: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub value_buy: Option<Decimal>,
}

/// Official and blue ARS/USD quotes as published by Bluelytics.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BlueLyticsQuote {
    #[serde(default)]
    pub oficial: UsdRate,
    #[serde(default)]
    pub blue: UsdRate,
    #[serde(default)]
    pub last_update: Option<Timestamp>,
}

impl BlueLyticsQuote {
    pub fn from_json(body: &str) -> EngineResult<Self> {
        serde_json::from_str(body).map_err(|e| EngineError::MalformedResponse {
            name: "bluelytics".to_string(),
            reason: e.to_string(),
        })
    }

    /// Multiplier from the official to the blue sell rate, if both are usable.
    pub fn sell_gap_multiplier(&self) -> Option<Decimal> {
        let official = self.oficial.value_sell.filter(|v| *v > Decimal::ZERO)?;
        let blue = self.blue.value_sell.filter(|v| *v > Decimal::ZERO)?;
        blue.checked_div(official)
    }
}

/// Scales official-rate ARS prices to the blue market rate.
pub struct ArsBlueRateTransformer {
    scope: CurrencyCode,
    gap: Arc<BlueGapCache>,
}

impl ArsBlueRateTransformer {
    pub fn new(gap: Arc<BlueGapCache>) -> Self {
        Self {
            scope: CurrencyCode::ars(),
            gap,
        }
    }
}

impl RateTransformer for ArsBlueRateTransformer {
    fn scope_currency(&self) -> &CurrencyCode {
        &self.scope
    }

    fn apply(&self, source: &SourceMeta, observation: &Observation) -> Vec<Observation> {
        if source.reports_blue_rate {
            return vec![observation.clone()];
        }

        let Some(multiplier) = self.gap.multiplier() else {
            debug!(
                source = %source.name,
                error = %EngineError::GapUnavailable,
                "Withholding official ARS price"
            );
            return Vec::new();
        };

        match observation.with_price(observation.price() * multiplier) {
            Ok(adjusted) => vec![adjusted],
            Err(e) => {
                warn!(source = %source.name, error = %e, "Dropping ARS price after blue adjustment");
                Vec::new()
            }
        }
    }
}
