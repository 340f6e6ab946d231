use log::debug;

use super::journal::PolicyJournal;
use crate::blockchain::ChainState;
use crate::error::PolicyError;

/// Per-node state every policy carries: identity, the runtime's tick, the
/// lazily bound chain state and the diagnostic journal.
#[derive(Debug, Clone)]
pub struct PolicyContext {
    node_id: String,
    current_tick: u64,
    chain: Option<ChainState>,
    journal: PolicyJournal,
}

impl PolicyContext {
    pub fn new(node_id: &str, log_limit: usize) -> Self {
        Self {
            node_id: node_id.to_string(),
            current_tick: 0,
            chain: None,
            journal: PolicyJournal::new(log_limit),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn set_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    pub fn bind(&mut self, chain: ChainState) {
        self.chain = Some(chain);
    }

    pub fn is_bound(&self) -> bool {
        self.chain.is_some()
    }

    pub fn chain(&self) -> Result<&ChainState, PolicyError> {
        self.chain.as_ref().ok_or_else(|| PolicyError::UnboundState {
            node_id: self.node_id.clone(),
        })
    }

    pub fn chain_mut(&mut self) -> Result<&mut ChainState, PolicyError> {
        self.chain.as_mut().ok_or_else(|| PolicyError::UnboundState {
            node_id: self.node_id.clone(),
        })
    }

    /// Diagnostic log line scoped to this node and tick.
    pub fn log(&mut self, message: &str) {
        debug!(target: "policy", "[{}@{}] {}", self.node_id, self.current_tick, message);
        self.journal.record(self.current_tick, message);
    }

    pub fn journal(&self) -> &PolicyJournal {
        &self.journal
    }
}
