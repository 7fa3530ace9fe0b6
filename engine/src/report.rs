//! The published market price report.

use pricenode_common::CurrencyCode;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::consensus::ConsensusRate;
use crate::health::SourceHealth;

/// Health of every source plus the currency-sorted consensus rates.
///
/// Serializes as one flat object: `<prefix>Ts` and `<prefix>Count` per
/// source in registration order, then `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketPrices {
    pub sources: Vec<SourceHealth>,
    pub data: Vec<ConsensusRate>,
}

impl MarketPrices {
    pub fn new(sources: Vec<SourceHealth>, data: Vec<ConsensusRate>) -> Self {
        Self { sources, data }
    }

    /// Number of top-level fields in the serialized report.
    pub fn field_count(&self) -> usize {
        2 * self.sources.len() + 1
    }

    /// Look up the consensus rate for a currency.
    pub fn rate(&self, currency: &CurrencyCode) -> Option<&ConsensusRate> {
        self.data
            .binary_search_by(|r| r.currency.cmp(currency))
            .ok()
            .map(|idx| &self.data[idx])
    }

    pub fn source(&self, name: &str) -> Option<&SourceHealth> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for MarketPrices {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.field_count()))?;
        for health in &self.sources {
            map.serialize_entry(&format!("{}Ts", health.prefix), &health.timestamp_millis)?;
            map.serialize_entry(&format!("{}Count", health.prefix), &health.count)?;
        }
        map.serialize_entry("data", &self.data)?;
        map.end()
    }
}
