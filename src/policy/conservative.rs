use super::{Intake, Policy, PolicyConfig, PolicyContext, PolicyKind, SeenSet, intake};
use crate::blockchain::Block;
use crate::error::PolicyError;

/// Delayed-relay policy: mines rarely and relays a block only once
/// `wait_time` ticks have elapsed since its first receipt.
///
/// A block is judged at its own receipt tick, when it has waited zero ticks,
/// so with a non-zero wait this policy keeps what it hears to itself. Only
/// the most recent receipt is remembered, for inspection. Favors stability
/// over liveness.
#[derive(Debug)]
pub struct ConservativePolicy {
    ctx: PolicyContext,
    seen: SeenSet,
    interval: u64,
    wait_time: u64,
    // hash and tick of the last block attached from the network
    last_receipt: Option<(String, u64)>,
}

impl ConservativePolicy {
    pub fn new(node_id: &str, config: &PolicyConfig) -> Self {
        Self {
            ctx: PolicyContext::new(node_id, config.log_limit),
            seen: SeenSet::new(config.seen_capacity),
            interval: config.slow_interval.max(1),
            wait_time: config.wait_time,
            last_receipt: None,
        }
    }

    /// Receipt tick of `hash`, if it is the last block received.
    pub fn received_at(&self, hash: &str) -> Option<u64> {
        self.last_receipt
            .as_ref()
            .filter(|(last, _)| last == hash)
            .map(|(_, tick)| *tick)
    }
}

impl Policy for ConservativePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Conservative
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
        if intake(&mut self.ctx, &mut self.seen, block, sender_id)? != Intake::Attached {
            return Ok(false);
        }

        let tick = self.ctx.current_tick();
        self.last_receipt = Some((block.hash.clone(), tick));

        // Judged on arrival: nothing has waited yet.
        Ok(self.wait_time == 0)
    }

    fn choose_parent_block(&mut self) -> Result<String, PolicyError> {
        Ok(self.ctx.chain()?.get_head().hash.clone())
    }
}
