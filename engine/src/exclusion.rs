//! Currencies the node refuses to publish, globally or per source.

use pricenode_common::CurrencyCode;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, EngineResult};

/// Global and per-source currency exclusions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrencyExclusions {
    global: BTreeSet<CurrencyCode>,
    /// Keyed by upper-cased source name.
    by_source: BTreeMap<String, BTreeSet<CurrencyCode>>,
}

impl CurrencyExclusions {
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse `"LBP,USD"` style global codes and `"HUOBI:BRL,BINANCE:GBP"`
    /// style per-source pairs. Blank entries are ignored.
    pub fn parse(global: &str, by_source: &str) -> EngineResult<Self> {
        let mut exclusions = Self::default();

        for code in split_list(global) {
            exclusions.global.insert(CurrencyCode::new(code));
        }

        for entry in split_list(by_source) {
            let (source, code) = entry.split_once(':').ok_or_else(|| {
                EngineError::InvalidConfig(format!(
                    "Per-source exclusion '{entry}' is not SOURCE:CODE"
                ))
            })?;
            let (source, code) = (source.trim(), code.trim());
            if source.is_empty() || code.is_empty() {
                return Err(EngineError::InvalidConfig(format!(
                    "Per-source exclusion '{entry}' has an empty part"
                )));
            }
            exclusions = exclusions.exclude_for(source, code);
        }

        Ok(exclusions)
    }

    /// Exclude a currency for every source.
    pub fn exclude(mut self, code: impl Into<CurrencyCode>) -> Self {
        self.global.insert(code.into());
        self
    }

    /// Exclude a currency for one source.
    pub fn exclude_for(mut self, source: &str, code: impl Into<CurrencyCode>) -> Self {
        self.by_source
            .entry(source.trim().to_uppercase())
            .or_default()
            .insert(code.into());
        self
    }

    /// Merge another set of exclusions into this one.
    pub fn merge(mut self, other: CurrencyExclusions) -> Self {
        self.global.extend(other.global);
        for (source, codes) in other.by_source {
            self.by_source.entry(source).or_default().extend(codes);
        }
        self
    }

    /// Check if `source` may not report `code`.
    pub fn is_excluded(&self, source: &str, code: &CurrencyCode) -> bool {
        if self.global.contains(code) {
            return true;
        }
        self.by_source
            .get(&source.trim().to_uppercase())
            .map_or(false, |codes| codes.contains(code))
    }

    pub fn global(&self) -> impl Iterator<Item = &CurrencyCode> {
        self.global.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.by_source.is_empty()
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}
