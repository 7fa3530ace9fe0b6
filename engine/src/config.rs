//! Engine configuration.

use chrono::Duration;
use pricenode_common::constants;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::consensus::DEFAULT_DEVIATION_MULTIPLIER;
use crate::error::{EngineError, EngineResult};
use crate::exclusion::CurrencyExclusions;

/// Configuration for the consensus engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Standard deviations from the mean within which a price is an inlier.
    pub deviation_multiplier: Decimal,
    /// Minimum interval between repeated diagnostics.
    pub log_gate_interval: Duration,
    /// Upper bound on a single source fetch.
    pub fetch_timeout: Duration,
    /// Currencies dropped at the source boundary.
    pub exclusions: CurrencyExclusions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deviation_multiplier: DEFAULT_DEVIATION_MULTIPLIER,
            log_gate_interval: constants::default_log_gate_interval(),
            fetch_timeout: constants::default_fetch_timeout(),
            exclusions: CurrencyExclusions::none(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable numeric values fall back to the defaults; malformed
    /// exclusion lists are an error.
    pub fn from_env() -> EngineResult<Self> {
        let mut config = Self::default();

        if let Ok(k) = std::env::var("PRICENODE_OUTLIER_STD_DEVIATION") {
            if let Ok(k) = Decimal::from_str(k.trim()) {
                config.deviation_multiplier = k;
            }
        }

        if let Ok(secs) = std::env::var("PRICENODE_LOG_GATE_SECS") {
            if let Ok(secs) = secs.trim().parse::<i64>() {
                config.log_gate_interval = Duration::seconds(secs);
            }
        }

        if let Ok(secs) = std::env::var("PRICENODE_FETCH_TIMEOUT_SECS") {
            if let Ok(secs) = secs.trim().parse::<i64>() {
                config.fetch_timeout = Duration::seconds(secs);
            }
        }

        let fiat = std::env::var("PRICENODE_FIAT_EXCLUDED").unwrap_or_default();
        let crypto = std::env::var("PRICENODE_CRYPTO_EXCLUDED").unwrap_or_default();
        let by_source = std::env::var("PRICENODE_EXCLUDED_BY_PROVIDER").unwrap_or_default();
        config.exclusions = CurrencyExclusions::parse(&fiat, &by_source)?
            .merge(CurrencyExclusions::parse(&crypto, "")?);

        Ok(config)
    }

    pub fn with_deviation_multiplier(mut self, k: Decimal) -> Self {
        self.deviation_multiplier = k;
        self
    }

    pub fn with_exclusions(mut self, exclusions: CurrencyExclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.deviation_multiplier <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "Deviation multiplier must be positive".to_string(),
            ));
        }

        if self.fetch_timeout <= Duration::zero() {
            return Err(EngineError::InvalidConfig(
                "Fetch timeout must be positive".to_string(),
            ));
        }

        if self.log_gate_interval < Duration::zero() {
            return Err(EngineError::InvalidConfig(
                "Log gate interval cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}
