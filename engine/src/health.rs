//! Per-source liveness metadata.

use pricenode_common::{now, Timestamp};
use tracing::error;

use crate::error::EngineError;
use crate::source::Source;

/// Health of one source at report time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHealth {
    pub name: String,
    pub prefix: String,
    /// Epoch millis of the source's latest own observation, 0 when it has none.
    pub timestamp_millis: i64,
    /// Observations cached after eviction.
    pub count: usize,
}

impl SourceHealth {
    pub fn is_live(&self) -> bool {
        self.timestamp_millis > 0
    }
}

/// Builds health entries, one per source, in registration order.
#[derive(Debug, Default, Clone, Copy)]
pub struct HealthReporter;

impl HealthReporter {
    pub fn new() -> Self {
        Self
    }

    /// Report every source's health as of now.
    pub fn report(&self, sources: &[Source]) -> Vec<SourceHealth> {
        self.report_at(sources, now())
    }

    /// Report every source's health as of `now`.
    pub fn report_at(&self, sources: &[Source], now: Timestamp) -> Vec<SourceHealth> {
        sources.iter().map(|s| self.source_health(s, now)).collect()
    }

    fn source_health(&self, source: &Source, now: Timestamp) -> SourceHealth {
        let meta = source.meta();
        source.cache().evict_stale(now);
        let snapshot = source.cache().snapshot();

        let timestamp_millis = snapshot
            .observations()
            .iter()
            .filter(|o| o.source() == meta.name)
            .map(|o| o.timestamp().timestamp_millis())
            .max()
            .unwrap_or_else(|| {
                let err = EngineError::NoDataForSource(meta.name.clone());
                error!(source = %meta.name, error = %err, "Source has no current data");
                0
            });

        SourceHealth {
            name: meta.name.clone(),
            prefix: meta.prefix.clone(),
            timestamp_millis,
            count: snapshot.len(),
        }
    }
}
