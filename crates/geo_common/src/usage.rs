use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

/// Counts outbound requests per imagery provider.
///
/// Owned by whoever wires the fetchers together and passed in explicitly, so
/// tests get their own instance and can run concurrently.
#[derive(Debug, Default)]
pub struct UsageCounter {
    counts: Mutex<HashMap<String, u64>>,
}

impl UsageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request against `provider`
    pub fn record(&self, provider: &str) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(provider.to_string()).or_insert(0) += 1;
    }

    /// Requests recorded for `provider` since the last reset
    pub fn count(&self, provider: &str) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(provider).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.values().sum()
    }

    /// Sorted copy of all counters
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Zero every counter
    pub fn reset(&self) {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
