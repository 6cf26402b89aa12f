use std::time::Duration;

use serde::Deserialize;

const fn default_poll_interval() -> u64 {
    1000
}

const fn default_max_unknown_responses() -> u32 {
    3
}

const fn default_event_capacity() -> usize {
    1024
}

/// Tuning shared by every provider engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Prepended to every queue key
    #[serde(default)]
    pub prefix: String,

    /// How long an idle engine waits before looking for work again
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Consecutive unknown response codes tolerated for one batch before the
    /// provider is treated as failing
    #[serde(default = "default_max_unknown_responses")]
    pub max_unknown_responses: u32,

    /// Events buffered per subscriber before the slowest one starts lagging
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            poll_interval_ms: default_poll_interval(),
            max_unknown_responses: default_max_unknown_responses(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
