use std::collections::VecDeque;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A SEARCH that ran longer than the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowQuery {
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub query: String,
}

/// Bounded per-index log, the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct SlowLog {
    entries: VecDeque<SlowQuery>,
    capacity: usize,
}

impl SlowLog {
    pub fn new(capacity: usize) -> Self {
        SlowLog {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn record(&mut self, query: &str, elapsed: Duration) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SlowQuery {
            timestamp: Utc::now(),
            elapsed_ms: elapsed.as_millis() as u64,
            query: query.to_string(),
        });
    }

    pub fn entries(&self) -> Vec<SlowQuery> {
        self.entries.iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_entries() {
        let mut log = SlowLog::new(2);
        log.record("a", Duration::from_millis(150));
        log.record("b", Duration::from_millis(200));
        log.record("c", Duration::from_millis(250));

        let queries: Vec<_> = log.entries().into_iter().map(|e| e.query).collect();
        assert_eq!(queries, vec!["b", "c"]);
        assert_eq!(log.entries()[1].elapsed_ms, 250);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut log = SlowLog::new(0);
        log.record("a", Duration::from_secs(1));
        assert_eq!(log.len(), 0);
    }
}
