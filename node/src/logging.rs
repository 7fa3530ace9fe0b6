//! Tracing subscriber setup shared by the node binaries.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{NodeError, NodeResult};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. Fails if a subscriber
/// is already installed.
pub fn init_tracing(default_level: &str, json: bool) -> NodeResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| NodeError::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .try_init()
        .map_err(|e| NodeError::Logging(e.to_string()))
}
