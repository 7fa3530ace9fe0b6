//! Per-source cache of the latest observation per currency.

use chrono::Duration;
use dashmap::DashMap;
use parking_lot::RwLock;
use pricenode_common::{age, CurrencyCode, Observation, Timestamp};
use tracing::debug;

/// Immutable copy of a source's cache at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSnapshot {
    observations: Vec<Observation>,
}

impl SourceSnapshot {
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn get(&self, currency: &CurrencyCode) -> Option<&Observation> {
        self.observations.iter().find(|o| o.currency() == currency)
    }
}

impl IntoIterator for SourceSnapshot {
    type Item = Observation;
    type IntoIter = std::vec::IntoIter<Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.into_iter()
    }
}

/// Thread-safe store holding at most one observation per currency.
pub struct SourceCache {
    entries: DashMap<CurrencyCode, Observation>,
    staleness_window: Duration,
    last_updated: RwLock<Option<Timestamp>>,
}

impl SourceCache {
    /// Create an empty cache evicting entries older than `staleness_window`.
    pub fn new(staleness_window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            staleness_window,
            last_updated: RwLock::new(None),
        }
    }

    /// Store an observation, replacing any earlier one for its currency.
    pub fn record(&self, observation: Observation) {
        self.entries
            .insert(observation.currency().clone(), observation);
    }

    /// Store a batch from one poll.
    pub fn record_all(&self, observations: impl IntoIterator<Item = Observation>, at: Timestamp) {
        let mut recorded = 0usize;
        for observation in observations {
            self.record(observation);
            recorded += 1;
        }
        if recorded > 0 {
            *self.last_updated.write() = Some(at);
        }
    }

    /// Drop every entry older than the staleness window. Returns the number dropped.
    pub fn evict_stale(&self, now: Timestamp) -> usize {
        let before = self.entries.len();
        let window = self.staleness_window;
        self.entries
            .retain(|_, observation| age(observation.timestamp(), now) <= window);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, "Evicted stale observations");
        }
        evicted
    }

    /// Copy the current contents, sorted by currency code.
    pub fn snapshot(&self) -> SourceSnapshot {
        let mut observations: Vec<Observation> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        observations.sort_by(|a, b| a.currency().cmp(b.currency()));
        SourceSnapshot { observations }
    }

    pub fn get(&self, currency: &CurrencyCode) -> Option<Observation> {
        self.entries.get(currency).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    /// When the last non-empty batch was recorded.
    pub fn last_updated(&self) -> Option<Timestamp> {
        *self.last_updated.read()
    }
}
