use serde::Deserialize;

use crate::error::ConfigError;

/// Default mining cadence in ticks.
pub const DEFAULT_BASE_INTERVAL: u64 = 10;

/// Default cadence of the delayed-relay policy.
pub const DEFAULT_SLOW_INTERVAL: u64 = 20;

/// Ticks a delayed-relay policy waits before relaying.
pub const DEFAULT_WAIT_TIME: u64 = 15;

/// Fork observations kept by the adaptive policy.
pub const DEFAULT_OBSERVATION_WINDOW: usize = 20;

/// Height lag above which the lag policy always mines.
pub const DEFAULT_LAG_THRESHOLD: u64 = 2;

pub const DEFAULT_MINE_PROBABILITY: f64 = 0.5;

/// Fork rates above this make the adaptive policy back off.
pub const DEFAULT_FORK_RATE_HIGH: f64 = 0.5;

/// Fork rates below this make the adaptive policy speed up.
pub const DEFAULT_FORK_RATE_LOW: f64 = 0.2;

pub const DEFAULT_SEEN_CAPACITY: usize = 10_000;

pub const DEFAULT_LOG_LIMIT: usize = 200;

/// Tuning knobs shared by all policy variants. Each variant reads the
/// fields it needs; missing fields fall back to the defaults above.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub base_interval: u64,
    pub slow_interval: u64,
    pub wait_time: u64,
    pub observation_window: usize,
    pub lag_threshold: u64,
    pub mine_probability: f64,
    pub fork_rate_high: f64,
    pub fork_rate_low: f64,
    /// Seen-set bound; 0 keeps every hash.
    pub seen_capacity: usize,
    /// Journal entries kept per node.
    pub log_limit: usize,
    pub seed: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            base_interval: DEFAULT_BASE_INTERVAL,
            slow_interval: DEFAULT_SLOW_INTERVAL,
            wait_time: DEFAULT_WAIT_TIME,
            observation_window: DEFAULT_OBSERVATION_WINDOW,
            lag_threshold: DEFAULT_LAG_THRESHOLD,
            mine_probability: DEFAULT_MINE_PROBABILITY,
            fork_rate_high: DEFAULT_FORK_RATE_HIGH,
            fork_rate_low: DEFAULT_FORK_RATE_LOW,
            seen_capacity: DEFAULT_SEEN_CAPACITY,
            log_limit: DEFAULT_LOG_LIMIT,
            seed: 0,
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_interval == 0 || self.slow_interval == 0 {
            return Err(ConfigError::Invalid("mining intervals must be > 0".into()));
        }
        if self.observation_window == 0 {
            return Err(ConfigError::Invalid("observation_window must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.mine_probability) {
            return Err(ConfigError::Invalid(format!(
                "mine_probability {} outside [0, 1]",
                self.mine_probability
            )));
        }
        let rate_ok = |r: f64| (0.0..=1.0).contains(&r);
        if !rate_ok(self.fork_rate_low) || !rate_ok(self.fork_rate_high) {
            return Err(ConfigError::Invalid("fork rates must lie in [0, 1]".into()));
        }
        if self.fork_rate_low > self.fork_rate_high {
            return Err(ConfigError::Invalid(format!(
                "fork_rate_low {} exceeds fork_rate_high {}",
                self.fork_rate_low, self.fork_rate_high
            )));
        }
        Ok(())
    }
}
