use std::env;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::policy::{PolicyConfig, PolicyKind};

pub const DEFAULT_TICKS: u64 = 1000;
pub const DEFAULT_NODES: &str = "greedy,interval,conservative,lag,adaptive";

/// Process-level settings, read from the environment (`.env` supported).
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub nodes: Vec<PolicyKind>,
    pub ticks: u64,
    pub serve: bool,
    pub host: String,
    pub port: u16,
    pub policy: PolicyConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nodes: PolicyKind::ALL.to_vec(),
            ticks: DEFAULT_TICKS,
            serve: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
            policy: PolicyConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let p = defaults.policy.clone();

        let nodes = parse_nodes(&lookup("NODES").unwrap_or_else(|| DEFAULT_NODES.to_string()))?;
        let policy = PolicyConfig {
            base_interval: parse(&lookup, "BASE_INTERVAL", p.base_interval)?,
            slow_interval: parse(&lookup, "SLOW_INTERVAL", p.slow_interval)?,
            wait_time: parse(&lookup, "WAIT_TIME", p.wait_time)?,
            observation_window: parse(&lookup, "OBSERVATION_WINDOW", p.observation_window)?,
            lag_threshold: parse(&lookup, "LAG_THRESHOLD", p.lag_threshold)?,
            mine_probability: parse(&lookup, "MINE_PROBABILITY", p.mine_probability)?,
            fork_rate_high: parse(&lookup, "FORK_RATE_HIGH", p.fork_rate_high)?,
            fork_rate_low: parse(&lookup, "FORK_RATE_LOW", p.fork_rate_low)?,
            seen_capacity: parse(&lookup, "SEEN_CAPACITY", p.seen_capacity)?,
            log_limit: parse(&lookup, "LOG_LIMIT", p.log_limit)?,
            seed: parse(&lookup, "SEED", p.seed)?,
        };
        policy.validate()?;

        Ok(Self {
            nodes,
            ticks: parse(&lookup, "TICKS", defaults.ticks)?,
            serve: parse(&lookup, "SERVE", defaults.serve)?,
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT", defaults.port)?,
            policy,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}

/// `"greedy,lag:3"` -> one greedy node followed by three lag nodes.
fn parse_nodes(raw: &str) -> Result<Vec<PolicyKind>, ConfigError> {
    let mut nodes = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, count) = match item.split_once(':') {
            Some((name, count)) => {
                let count: usize = count.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "NODES".to_string(),
                    value: item.to_string(),
                })?;
                (name, count)
            }
            None => (item, 1),
        };
        let kind: PolicyKind = name.parse()?;
        nodes.extend(std::iter::repeat_n(kind, count));
    }
    if nodes.is_empty() {
        return Err(ConfigError::Invalid("NODES must name at least one policy".into()));
    }
    Ok(nodes)
}
