//! Node error types.

use pricenode_engine::EngineError;
use thiserror::Error;

use crate::state::NodeState;

/// Errors raised by the node lifecycle.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Operation not allowed while node is {0}")]
    InvalidState(NodeState),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl NodeError {
    /// Get error code for diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self {
            NodeError::Engine(_) => "ENGINE_ERROR",
            NodeError::InvalidState(_) => "INVALID_STATE",
            NodeError::InvalidConfig(_) => "INVALID_CONFIG",
            NodeError::Logging(_) => "LOGGING_ERROR",
        }
    }
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
