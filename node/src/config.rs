//! Node configuration.

use chrono::Duration;
use pricenode_common::constants;
use pricenode_engine::EngineConfig;

use crate::error::{NodeError, NodeResult};

/// Main node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Node ID used in logs; generated when absent.
    pub node_id: Option<String>,
    /// Interval between blue market gap refreshes.
    pub gap_refresh_interval: Duration,
    /// Poll every source once before the background loops start.
    pub poll_on_start: bool,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit JSON log lines.
    pub log_json: bool,
    /// Consensus engine configuration.
    pub engine: EngineConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            gap_refresh_interval: constants::default_gap_refresh_interval(),
            poll_on_start: true,
            log_level: "info".to_string(),
            log_json: false,
            engine: EngineConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> NodeResult<Self> {
        let mut config = Self {
            engine: EngineConfig::from_env()?,
            ..Self::default()
        };

        if let Ok(id) = std::env::var("PRICENODE_NODE_ID") {
            if !id.trim().is_empty() {
                config.node_id = Some(id.trim().to_string());
            }
        }

        if let Ok(secs) = std::env::var("PRICENODE_GAP_REFRESH_SECS") {
            if let Ok(secs) = secs.trim().parse::<i64>() {
                config.gap_refresh_interval = Duration::seconds(secs);
            }
        }

        if let Ok(flag) = std::env::var("PRICENODE_POLL_ON_START") {
            if let Ok(flag) = flag.trim().parse() {
                config.poll_on_start = flag;
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(flag) = std::env::var("PRICENODE_LOG_JSON") {
            if let Ok(flag) = flag.trim().parse() {
                config.log_json = flag;
            }
        }

        Ok(config)
    }

    /// Node ID, falling back to a generated one.
    pub fn resolve_node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| format!("pricenode-{}", uuid::Uuid::new_v4()))
    }

    /// Validate configuration.
    pub fn validate(&self) -> NodeResult<()> {
        self.engine.validate()?;

        if self.gap_refresh_interval <= Duration::zero() {
            return Err(NodeError::InvalidConfig(
                "Gap refresh interval must be positive".to_string(),
            ));
        }

        if self.log_level.trim().is_empty() {
            return Err(NodeError::InvalidConfig("Log level cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.gap_refresh_interval, Duration::hours(1));
        assert!(config.poll_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generated_node_id() {
        let config = NodeConfig::default();
        assert!(config.resolve_node_id().starts_with("pricenode-"));

        let named = NodeConfig {
            node_id: Some("node-1".to_string()),
            ..NodeConfig::default()
        };
        assert_eq!(named.resolve_node_id(), "node-1");
    }

    #[test]
    fn test_validation_covers_engine() {
        let mut config = NodeConfig::default();
        config.engine.deviation_multiplier = Decimal::ZERO;
        assert!(matches!(config.validate(), Err(NodeError::Engine(_))));

        let config = NodeConfig {
            gap_refresh_interval: Duration::zero(),
            ..NodeConfig::default()
        };
        assert!(matches!(config.validate(), Err(NodeError::InvalidConfig(_))));
    }
}
