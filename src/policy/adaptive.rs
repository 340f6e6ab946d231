//! Adaptive policy: a discrete-time controller over the observed fork rate.
//!
//! Each received block contributes one sample to a sliding window: whether
//! the local chain state showed a fork right after the block was processed.
//! The fork rate over that window selects one of three mining intervals:
//!
//! | fork rate              | interval                          |
//! |------------------------|-----------------------------------|
//! | `> fork_rate_high`     | `round(base * 1.5)`               |
//! | `< fork_rate_low`      | `max(5, round(base * 0.7))`       |
//! | otherwise / no samples | `base`                            |
//!
//! The node mines when `current_tick % interval == 0`.

use log::info;
use std::collections::VecDeque;

use super::{Intake, Policy, PolicyConfig, PolicyContext, PolicyKind, SeenSet, intake};
use crate::blockchain::Block;
use crate::error::PolicyError;

/// Lowest interval the controller will ever select.
pub const MIN_INTERVAL: u64 = 5;

/// Interval multiplier when forks are frequent.
pub const BACKOFF_FACTOR: f64 = 1.5;

/// Interval multiplier when forks are rare.
pub const SPEEDUP_FACTOR: f64 = 0.7;

/// Fixed-capacity window of fork observations.
#[derive(Debug, Clone)]
pub struct ForkRateWindow {
    capacity: usize,
    samples: VecDeque<bool>,
    forks: usize,
}

impl ForkRateWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            forks: 0,
        }
    }

    pub fn record(&mut self, forked: bool) {
        if self.samples.len() == self.capacity {
            if let Some(true) = self.samples.pop_front() {
                self.forks -= 1;
            }
        }
        self.samples.push_back(forked);
        if forked {
            self.forks += 1;
        }
    }

    /// Share of samples that saw a fork; `None` before the first sample.
    pub fn fork_rate(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.forks as f64 / self.samples.len() as f64)
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Three-level interval selection with fixed thresholds.
#[derive(Debug, Clone, Copy)]
pub struct IntervalController {
    base: u64,
    high: f64,
    low: f64,
}

impl IntervalController {
    /// `base` is raised to [`MIN_INTERVAL`] so every level respects the floor.
    pub fn new(base: u64, high: f64, low: f64) -> Self {
        Self {
            base: base.max(MIN_INTERVAL),
            high,
            low,
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn interval_for(&self, fork_rate: Option<f64>) -> u64 {
        let base = self.base as f64;
        match fork_rate {
            Some(rate) if rate > self.high => (base * BACKOFF_FACTOR).round() as u64,
            Some(rate) if rate < self.low => {
                MIN_INTERVAL.max((base * SPEEDUP_FACTOR).round() as u64)
            }
            _ => self.base,
        }
    }
}

#[derive(Debug)]
pub struct AdaptivePolicy {
    ctx: PolicyContext,
    seen: SeenSet,
    window: ForkRateWindow,
    controller: IntervalController,
    interval: u64,
}

impl AdaptivePolicy {
    pub fn new(node_id: &str, config: &PolicyConfig) -> Self {
        let controller = IntervalController::new(
            config.base_interval,
            config.fork_rate_high,
            config.fork_rate_low,
        );
        Self {
            ctx: PolicyContext::new(node_id, config.log_limit),
            seen: SeenSet::new(config.seen_capacity),
            window: ForkRateWindow::new(config.observation_window),
            interval: controller.base(),
            controller,
        }
    }

    /// Mining interval currently in force.
    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn fork_rate(&self) -> Option<f64> {
        self.window.fork_rate()
    }

    fn observe(&mut self, forked: bool) {
        self.window.record(forked);
        let next = self.controller.interval_for(self.window.fork_rate());
        if next != self.interval {
            let rate = self.window.fork_rate().unwrap_or_default();
            info!(
                "{} retuned mining interval {} -> {} (fork rate {:.2})",
                self.ctx.node_id(),
                self.interval,
                next,
                rate
            );
            self.ctx.log(&format!(
                "interval {} -> {next} (fork rate {rate:.2})",
                self.interval
            ));
            self.interval = next;
        }
    }
}

impl Policy for AdaptivePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Adaptive
    }

    fn context(&self) -> &PolicyContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut PolicyContext {
        &mut self.ctx
    }

    fn should_mine_block(&mut self) -> Result<bool, PolicyError> {
        self.ctx.chain()?;
        Ok(self.ctx.current_tick() % self.interval == 0)
    }

    fn on_block_received(&mut self, block: &Block, sender_id: &str) -> Result<bool, PolicyError> {
        let outcome = intake(&mut self.ctx, &mut self.seen, block, sender_id)?;
        if outcome == Intake::Duplicate {
            return Ok(false);
        }

        let forked = self.ctx.chain()?.has_fork();
        self.observe(forked);
        Ok(outcome == Intake::Attached)
    }

    fn choose_parent_block(&mut self) -> Result<String, PolicyError> {
        let chain = self.ctx.chain()?;
        let tips = chain.get_all_tips();
        let parent = match tips.as_slice() {
            [only] => *only,
            _ => chain.best_tip(),
        };
        Ok(parent.hash.clone())
    }
}
