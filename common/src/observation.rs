//! A single source's price for one currency at one instant.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::currency::CurrencyCode;
use crate::error::ObservationError;
use crate::time::Timestamp;

/// One price reported by one source.
///
/// Fields are private so the positive-price invariant established by
/// [`Observation::new`] holds for every value in circulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    currency: CurrencyCode,
    price: Decimal,
    timestamp: Timestamp,
    source: String,
}

impl Observation {
    /// Create a validated observation.
    pub fn new(
        currency: impl Into<CurrencyCode>,
        price: Decimal,
        timestamp: Timestamp,
        source: impl Into<String>,
    ) -> Result<Self, ObservationError> {
        let currency = currency.into();
        let source = source.into();

        if currency.is_empty() {
            return Err(ObservationError::EmptyCurrency);
        }
        if source.trim().is_empty() {
            return Err(ObservationError::EmptySource);
        }
        if price <= Decimal::ZERO {
            return Err(ObservationError::NonPositivePrice {
                currency: currency.to_string(),
                price,
            });
        }

        Ok(Self {
            currency,
            price,
            timestamp,
            source,
        })
    }

    /// Same currency, timestamp and source with a different price.
    pub fn with_price(&self, price: Decimal) -> Result<Self, ObservationError> {
        Self::new(
            self.currency.clone(),
            price,
            self.timestamp,
            self.source.clone(),
        )
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Label of the source that reported this price.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {} from {}",
            self.currency,
            self.price,
            self.timestamp.timestamp_millis(),
            self.source
        )
    }
}
