use super::{Intake, Policy, PolicyConfig, PolicyContext, PolicyKind, SeenSet, intake};
use crate::blockchain::Block;
use crate::error::PolicyError;

/// Mines on every tick, always on the head, and relays every block it
/// attaches exactly once. Produces many blocks and many forks.
#[derive(Debug)]
pub struct GreedyPolicy {
    ctx: PolicyContext,
    seen: SeenSet,
}

impl GreedyPolicy {
    pub fn new(node_id: &str, config: &PolicyConfig) -> Self {
        Self {
            ctx: PolicyContext::new(node_id, config.log_limit),
            seen: SeenSet::new(config.seen_capacity),
        }
    }
}

impl Policy for GreedyPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Greedy
    }

    fn context(&self) -> &PolicyContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut PolicyContext {
        &mut self.ctx
    }

    fn should_mine_block(&mut self) -> Result<bool, PolicyError> {
        self.ctx.chain()?;
        Ok(true)
    }

    fn on_block_received(&mut self, block: &Block, sender_id: &str) -> Result<bool, PolicyError> {
        let outcome = intake(&mut self.ctx, &mut self.seen, block, sender_id)?;
        Ok(outcome == Intake::Attached)
    }

    fn choose_parent_block(&mut self) -> Result<String, PolicyError> {
        Ok(self.ctx.chain()?.get_head().hash.clone())
    }
}
