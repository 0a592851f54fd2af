use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // SEARCH
    pub default_limit: usize,                   // LIMIT when the command omits it
    pub cursor_ttl_ms: u64,                     // WITHCURSOR without TIMEOUT
    pub slow_query_threshold_ms: u64,
    pub slow_query_log_capacity: usize,         // per index, oldest evicted first

    // Write queue
    pub sync_delay_ms: u64,                     // enqueue -> first drain tick
    pub sync_budget_ms: u64,                    // time box of a single drain tick

    // STAT
    pub stat_value_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_limit: 100,
            cursor_ttl_ms: 60_000,
            slow_query_threshold_ms: 100,
            slow_query_log_capacity: 256,
            sync_delay_ms: 0,
            sync_budget_ms: 300,
            stat_value_limit: 10,
        }
    }
}

impl EngineConfig {
    /// Load a configuration, missing keys fall back to the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn cursor_ttl(&self) -> Duration {
        Duration::from_millis(self.cursor_ttl_ms)
    }

    pub fn slow_query_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_query_threshold_ms)
    }

    pub fn sync_delay(&self) -> Duration {
        Duration::from_millis(self.sync_delay_ms)
    }

    pub fn sync_budget(&self) -> Duration {
        Duration::from_millis(self.sync_budget_ms)
    }
}
