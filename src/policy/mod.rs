//! Pluggable node decision policies.
//!
//! The runtime drives every policy through the three operations of
//! [`Policy`]: once per tick it asks `should_mine_block`, and on a `true`
//! immediately follows up with `choose_parent_block`; every inbound block
//! goes through `on_block_received`, whose result is the relay decision.

pub mod adaptive;
pub mod config;
pub mod conservative;
pub mod context;
pub mod greedy;
pub mod interval;
pub mod journal;
pub mod lag;
pub mod seen;

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::blockchain::{Block, ChainState};
use crate::error::{ConfigError, PolicyError};

pub use adaptive::AdaptivePolicy;
pub use config::PolicyConfig;
pub use conservative::ConservativePolicy;
pub use context::PolicyContext;
pub use greedy::GreedyPolicy;
pub use interval::IntervalPolicy;
pub use journal::{JournalEntry, PolicyJournal};
pub use lag::LagPolicy;
pub use seen::SeenSet;

/// Decision contract of a single node.
///
/// Every operation fails with [`PolicyError::UnboundState`] until a chain
/// state has been bound through [`Policy::bind`].
pub trait Policy: Send {
    fn kind(&self) -> PolicyKind;

    fn context(&self) -> &PolicyContext;

    fn context_mut(&mut self) -> &mut PolicyContext;

    /// Consulted once per tick, before any block delivery for that tick.
    fn should_mine_block(&mut self) -> Result<bool, PolicyError>;

    /// Consulted once per inbound block. Returns `true` to relay it.
    /// Re-delivery of an already seen block returns `false` and leaves the
    /// chain state untouched.
    fn on_block_received(&mut self, block: &Block, sender_id: &str) -> Result<bool, PolicyError>;

    /// Hash of a locally known block to build the next block on.
    fn choose_parent_block(&mut self) -> Result<String, PolicyError>;

    fn node_id(&self) -> &str {
        self.context().node_id()
    }

    fn current_tick(&self) -> u64 {
        self.context().current_tick()
    }

    fn bind(&mut self, chain: ChainState) {
        self.context_mut().bind(chain);
    }

    fn set_tick(&mut self, tick: u64) {
        self.context_mut().set_tick(tick);
    }
}

/// The reference policy variants, selected when a node is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Mine every tick, relay every new block.
    Greedy,
    /// Mine every `base_interval` ticks.
    Interval,
    /// Mine rarely, relay only after a wait.
    Conservative,
    /// Mine on height lag, otherwise with a fixed probability.
    Lag,
    /// Retune the mining interval from the observed fork rate.
    Adaptive,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 5] = [
        PolicyKind::Greedy,
        PolicyKind::Interval,
        PolicyKind::Conservative,
        PolicyKind::Lag,
        PolicyKind::Adaptive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Greedy => "greedy",
            PolicyKind::Interval => "interval",
            PolicyKind::Conservative => "conservative",
            PolicyKind::Lag => "lag",
            PolicyKind::Adaptive => "adaptive",
        }
    }

    /// Construct an unbound policy of this kind for `node_id`.
    pub fn build(self, node_id: &str, config: &PolicyConfig) -> Box<dyn Policy> {
        match self {
            PolicyKind::Greedy => Box::new(GreedyPolicy::new(node_id, config)),
            PolicyKind::Interval => Box::new(IntervalPolicy::new(node_id, config)),
            PolicyKind::Conservative => Box::new(ConservativePolicy::new(node_id, config)),
            PolicyKind::Lag => Box::new(LagPolicy::new(node_id, config)),
            PolicyKind::Adaptive => Box::new(AdaptivePolicy::new(node_id, config)),
        }
    }

    /// Construct with the default configuration.
    pub fn instantiate(self, node_id: &str) -> Box<dyn Policy> {
        self.build(node_id, &PolicyConfig::default())
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greedy" | "always" => Ok(PolicyKind::Greedy),
            "interval" | "basic" => Ok(PolicyKind::Interval),
            "conservative" | "delayed" => Ok(PolicyKind::Conservative),
            "lag" | "optimized" => Ok(PolicyKind::Lag),
            "adaptive" => Ok(PolicyKind::Adaptive),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// What the shared receive path did with an inbound block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intake {
    /// Already seen by this policy.
    Duplicate,
    /// First sighting, but the chain state did not attach it.
    Rejected,
    /// First sighting and newly attached.
    Attached,
}

/// Bound check, then seen check, then attach. Shared by every variant.
pub(crate) fn intake(
    ctx: &mut PolicyContext,
    seen: &mut SeenSet,
    block: &Block,
    sender_id: &str,
) -> Result<Intake, PolicyError> {
    let chain = ctx.chain_mut()?;
    let outcome = if !seen.insert(&block.hash) {
        Intake::Duplicate
    } else if chain.add_block(block.clone()) {
        Intake::Attached
    } else {
        Intake::Rejected
    };

    debug!(
        "{} <- {} from {}: {:?}",
        ctx.node_id(),
        block.block_id,
        sender_id,
        outcome
    );
    Ok(outcome)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::blockchain::{Block, ChainState};

    /// Chain state with a single linear branch of `len` blocks on genesis.
    pub fn linear_chain(len: u64) -> (ChainState, Vec<Block>) {
        let mut chain = ChainState::new();
        let mut blocks = vec![chain.genesis().clone()];
        for tick in 1..=len {
            let parent = blocks.last().cloned().unwrap_or_else(Block::genesis);
            let block = Block::new(&parent, "peer", tick, String::new());
            assert!(chain.add_block(block.clone()));
            blocks.push(block);
        }
        (chain, blocks)
    }
}
