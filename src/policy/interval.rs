use super::{Intake, Policy, PolicyConfig, PolicyContext, PolicyKind, SeenSet, intake};
use crate::blockchain::Block;
use crate::error::PolicyError;

/// Mines once every `base_interval` ticks on the head and relays blocks the
/// first time it attaches them.
#[derive(Debug)]
pub struct IntervalPolicy {
    ctx: PolicyContext,
    seen: SeenSet,
    interval: u64,
    last_mine_tick: u64,
}

impl IntervalPolicy {
    pub fn new(node_id: &str, config: &PolicyConfig) -> Self {
        Self {
            ctx: PolicyContext::new(node_id, config.log_limit),
            seen: SeenSet::new(config.seen_capacity),
            interval: config.base_interval.max(1),
            last_mine_tick: 0,
        }
    }
}

impl Policy for IntervalPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Interval
    }

    fn context(&self) -> &PolicyContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut PolicyContext {
        &mut self.ctx
    }

    fn should_mine_block(&mut self) -> Result<bool, PolicyError> {
        self.ctx.chain()?;
        let tick = self.ctx.current_tick();
        if tick.saturating_sub(self.last_mine_tick) < self.interval {
            return Ok(false);
        }
        self.last_mine_tick = tick;
        self.ctx.log(&format!("mining attempt at tick {tick}"));
        Ok(true)
    }

    fn on_block_received(&mut self, block: &Block, sender_id: &str) -> Result<bool, PolicyError> {
        match intake(&mut self.ctx, &mut self.seen, block, sender_id)? {
            Intake::Attached => {
                self.ctx.log(&format!(
                    "accepted {} from {sender_id}, height {}",
                    block.block_id, block.height
                ));
                Ok(true)
            }
            Intake::Rejected => {
                self.ctx
                    .log(&format!("not integrated: {} from {sender_id}", block.block_id));
                Ok(false)
            }
            Intake::Duplicate => Ok(false),
        }
    }

    fn choose_parent_block(&mut self) -> Result<String, PolicyError> {
        let head = self.ctx.chain()?.get_head();
        let (hash, message) = (
            head.hash.clone(),
            format!("parent {} (height {})", head.block_id, head.height),
        );
        self.ctx.log(&message);
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::ChainState;

    #[test]
    fn mines_every_n_ticks() {
        let config = PolicyConfig {
            base_interval: 10,
            ..PolicyConfig::default()
        };
        let mut policy = IntervalPolicy::new("node-0", &config);
        policy.bind(ChainState::new());

        let mined: Vec<u64> = (0..35)
            .filter(|&tick| {
                policy.set_tick(tick);
                policy.should_mine_block().unwrap()
            })
            .collect();
        assert_eq!(mined, vec![10, 20, 30]);
    }

    #[test]
    fn logs_decisions_to_journal() {
        let mut policy = IntervalPolicy::new("node-0", &PolicyConfig::default());
        policy.bind(ChainState::new());
        policy.set_tick(10);
        assert!(policy.should_mine_block().unwrap());
        policy.choose_parent_block().unwrap();

        let entries = policy.context().journal().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tick, 10);
        assert!(entries[1].message.starts_with("parent genesis"));
    }
}
