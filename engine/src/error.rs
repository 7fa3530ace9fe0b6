//! Engine error types.

use pricenode_common::ObservationError;
use thiserror::Error;

/// Errors that can occur in the consensus engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A source's poll failed or produced nothing usable.
    #[error("Fetch from {name} failed: {reason}")]
    SourceFetchFailure { name: String, reason: String },

    /// A source's poll did not finish in time.
    #[error("Fetch from {name} timed out after {timeout_ms}ms")]
    FetchTimeout { name: String, timeout_ms: u64 },

    /// No observation in a source's snapshot carries the source's own name.
    #[error("No price data found for {0}")]
    NoDataForSource(String),

    /// An upstream response could not be interpreted.
    #[error("Malformed response from {name}: {reason}")]
    MalformedResponse { name: String, reason: String },

    /// An observation failed validation.
    #[error("Invalid observation: {0}")]
    InvalidObservation(#[from] ObservationError),

    /// Two registered sources share a name or report prefix.
    #[error("Duplicate source: {0}")]
    DuplicateSource(String),

    /// No blue market gap multiplier is available yet.
    #[error("Blue market gap not available")]
    GapUnavailable,

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Check if the failure is expected to clear on the next poll.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::SourceFetchFailure { .. }
                | EngineError::FetchTimeout { .. }
                | EngineError::MalformedResponse { .. }
                | EngineError::GapUnavailable
        )
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
