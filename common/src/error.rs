//! Error types for price observations.

use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons an observation is rejected at the source boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObservationError {
    /// Price is zero or negative.
    #[error("Non-positive price {price} for {currency}")]
    NonPositivePrice { currency: String, price: Decimal },

    /// Currency code is empty after normalization.
    #[error("Empty currency code")]
    EmptyCurrency,

    /// Source label is empty.
    #[error("Empty source name")]
    EmptySource,
}

impl ObservationError {
    /// Get error code for diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self {
            ObservationError::NonPositivePrice { .. } => "NON_POSITIVE_PRICE",
            ObservationError::EmptyCurrency => "EMPTY_CURRENCY",
            ObservationError::EmptySource => "EMPTY_SOURCE",
        }
    }
}
