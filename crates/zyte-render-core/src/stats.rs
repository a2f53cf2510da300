//! Crawl statistics
//!
//! Named counters that handlers bump as they work. Updates are atomic, so a
//! single collector can be shared by every in-flight download.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Counter incremented once per successful Zyte API call
pub const REQUEST_COUNT_STAT: &str = "zyte-api/request_count";

/// Sink for named counters
pub trait StatsCollector: Send + Sync {
    /// Add one to the counter `key`, creating it at zero first if needed
    fn inc_value(&self, key: &str);

    /// Current value of the counter `key`
    fn get_value(&self, key: &str) -> Option<u64>;
}

/// In-memory [`StatsCollector`]
#[derive(Debug, Default)]
pub struct MemoryStats {
    counters: DashMap<String, AtomicU64>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every counter, sorted by key
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut values: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();
        values.sort();
        values
    }
}

impl StatsCollector for MemoryStats {
    fn inc_value(&self, key: &str) {
        if let Some(counter) = self.counters.get(key) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.counters
            .entry(key.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn get_value(&self, key: &str) -> Option<u64> {
        self.counters
            .get(key)
            .map(|counter| counter.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_inc_value_creates_counter() {
        let stats = MemoryStats::new();
        assert_eq!(stats.get_value(REQUEST_COUNT_STAT), None);
        stats.inc_value(REQUEST_COUNT_STAT);
        stats.inc_value(REQUEST_COUNT_STAT);
        assert_eq!(stats.get_value(REQUEST_COUNT_STAT), Some(2));
    }

    #[test]
    fn test_snapshot_sorted() {
        let stats = MemoryStats::new();
        stats.inc_value("b");
        stats.inc_value("a");
        stats.inc_value("b");
        assert_eq!(
            stats.snapshot(),
            vec![("a".to_string(), 1), ("b".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let stats = Arc::new(MemoryStats::new());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            tasks.push(tokio::spawn(async move {
                for _ in 0..100 {
                    stats.inc_value(REQUEST_COUNT_STAT);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(stats.get_value(REQUEST_COUNT_STAT), Some(800));
    }
}
