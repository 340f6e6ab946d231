use rand::{Rng, SeedableRng, rngs::StdRng};
use sha2::{Digest, Sha256};

use super::{Intake, Policy, PolicyConfig, PolicyContext, PolicyKind, SeenSet, intake};
use crate::blockchain::Block;
use crate::error::PolicyError;

/// Height-lag policy with probabilistic damping.
///
/// - Never mines while the local view has a fork.
/// - Mines unconditionally when the local head trails the best height it
///   has observed by more than `lag_threshold`.
/// - Otherwise mines with probability `mine_probability`.
///
/// Relays only blocks that extend the local head by exactly one, and only
/// while no fork is active.
#[derive(Debug)]
pub struct LagPolicy {
    ctx: PolicyContext,
    seen: SeenSet,
    lag_threshold: u64,
    mine_probability: f64,
    best_observed: u64,
    rng: StdRng,
}

impl LagPolicy {
    pub fn new(node_id: &str, config: &PolicyConfig) -> Self {
        Self {
            ctx: PolicyContext::new(node_id, config.log_limit),
            seen: SeenSet::new(config.seen_capacity),
            lag_threshold: config.lag_threshold,
            mine_probability: unit_probability(config.mine_probability),
            best_observed: 0,
            rng: StdRng::seed_from_u64(node_seed(config.seed, node_id)),
        }
    }

    /// Greatest height seen in any received block, attached or not.
    pub fn best_observed_height(&self) -> u64 {
        self.best_observed
    }
}

/// Clamp to `[0, 1]`; NaN and infinities never mine.
fn unit_probability(p: f64) -> f64 {
    if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
}

/// Mix the run seed with the node id so each node draws its own stream.
fn node_seed(seed: u64, node_id: &str) -> u64 {
    let digest = Sha256::digest(node_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    seed ^ u64::from_le_bytes(bytes)
}

impl Policy for LagPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Lag
    }

    fn context(&self) -> &PolicyContext {
        &self.ctx
    }

    fn context_mut(&mut self) -> &mut PolicyContext {
        &mut self.ctx
    }

    fn should_mine_block(&mut self) -> Result<bool, PolicyError> {
        let chain = self.ctx.chain()?;
        if chain.has_fork() {
            return Ok(false);
        }

        let local = chain.height();
        let lag = self.best_observed.saturating_sub(local);
        if lag > self.lag_threshold {
            self.ctx
                .log(&format!("lagging by {lag} (local {local}), mining"));
            return Ok(true);
        }

        Ok(self.rng.gen_bool(self.mine_probability))
    }

    fn on_block_received(&mut self, block: &Block, sender_id: &str) -> Result<bool, PolicyError> {
        let head_hash = self.ctx.chain()?.get_head().hash.clone();
        self.best_observed = self.best_observed.max(block.height);

        if intake(&mut self.ctx, &mut self.seen, block, sender_id)? != Intake::Attached {
            return Ok(false);
        }

        let chain = self.ctx.chain()?;
        Ok(block.parent_hash == head_hash && !chain.has_fork())
    }

    fn choose_parent_block(&mut self) -> Result<String, PolicyError> {
        let chain = self.ctx.chain()?;
        let parent = if chain.has_fork() {
            chain.best_tip()
        } else {
            chain.get_head()
        };
        Ok(parent.hash.clone())
    }
}
