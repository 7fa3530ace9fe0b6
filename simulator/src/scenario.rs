//! Simulation scenarios.

use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Wait for a duration.
    Wait { seconds: u64 },
    /// Inject a fault into a source, or the gap feed when `target` is `"GAP"`.
    InjectFault { fault_type: FaultType, target: String },
    /// Clear every fault of a source.
    ClearFault { target: String },
    /// Build and log a market price report.
    Snapshot,
}

/// Types of faults that can be injected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FaultType {
    /// Every fetch fails.
    Outage,
    /// Prices are reported far off the market with the given probability.
    OutlierBurst { probability: f64 },
}

/// Target naming the blue market gap feed.
pub const GAP_TARGET: &str = "GAP";

impl Scenario {
    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "steady" => Ok(Self::steady()),
            "outliers" => Ok(Self::outliers()),
            "outage" => Ok(Self::outage()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Parse a scenario from JSON.
    pub fn from_json(body: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Healthy sources only.
    fn steady() -> Self {
        Self {
            name: "steady".to_string(),
            description: "All sources healthy".to_string(),
            steps: vec![
                ScenarioStep::Wait { seconds: 5 },
                ScenarioStep::Snapshot,
                ScenarioStep::Wait { seconds: 10 },
                ScenarioStep::Snapshot,
            ],
        }
    }

    /// Two sources start reporting outliers, then recover.
    fn outliers() -> Self {
        Self {
            name: "outliers".to_string(),
            description: "Outlier prices filtered from the consensus".to_string(),
            steps: vec![
                ScenarioStep::Snapshot,
                ScenarioStep::InjectFault {
                    fault_type: FaultType::OutlierBurst { probability: 1.0 },
                    target: "KRAKEN".to_string(),
                },
                ScenarioStep::InjectFault {
                    fault_type: FaultType::OutlierBurst { probability: 0.5 },
                    target: "BINANCE".to_string(),
                },
                ScenarioStep::Wait { seconds: 10 },
                ScenarioStep::Snapshot,
                ScenarioStep::ClearFault {
                    target: "KRAKEN".to_string(),
                },
                ScenarioStep::ClearFault {
                    target: "BINANCE".to_string(),
                },
                ScenarioStep::Wait { seconds: 10 },
                ScenarioStep::Snapshot,
            ],
        }
    }

    /// A source and the gap feed go down long enough to go stale.
    fn outage() -> Self {
        Self {
            name: "outage".to_string(),
            description: "Source outage until its prices go stale, then recovery".to_string(),
            steps: vec![
                ScenarioStep::Snapshot,
                ScenarioStep::InjectFault {
                    fault_type: FaultType::Outage,
                    target: "BITSTAMP".to_string(),
                },
                ScenarioStep::InjectFault {
                    fault_type: FaultType::Outage,
                    target: GAP_TARGET.to_string(),
                },
                ScenarioStep::Wait { seconds: 20 },
                ScenarioStep::Snapshot,
                ScenarioStep::ClearFault {
                    target: "BITSTAMP".to_string(),
                },
                ScenarioStep::ClearFault {
                    target: GAP_TARGET.to_string(),
                },
                ScenarioStep::Wait { seconds: 10 },
                ScenarioStep::Snapshot,
            ],
        }
    }
}
