use log::{debug, error, info};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

use super::SimConfig;
use crate::blockchain::{Block, ChainState};
use crate::error::{ConfigError, PolicyError};
use crate::policy::{Policy, PolicyKind};

/// Per-node counters kept by the runtime.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NodeStats {
    pub mined: u64,
    pub received: u64,
    pub relayed: u64,
}

/// A block in flight to one node.
#[derive(Debug, Clone)]
struct Envelope {
    block: Block,
    sender: String,
    from: usize,
}

/// A block to fan out to every node except `from` (and `skip`, if set).
#[derive(Debug, Clone)]
struct Broadcast {
    block: Block,
    from: usize,
    skip: Option<usize>,
}

/// One participant: its policy, its inbox and its counters.
pub struct Node {
    policy: Box<dyn Policy>,
    inbox: VecDeque<Envelope>,
    stats: NodeStats,
    halted: Option<PolicyError>,
}

impl Node {
    fn new(policy: Box<dyn Policy>) -> Self {
        Self {
            policy,
            inbox: VecDeque::new(),
            stats: NodeStats::default(),
            halted: None,
        }
    }

    pub fn id(&self) -> &str {
        self.policy.node_id()
    }

    pub fn kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub fn policy(&self) -> &dyn Policy {
        &*self.policy
    }

    /// The node's chain state, if one was bound.
    pub fn chain(&self) -> Option<&ChainState> {
        self.policy.context().chain().ok()
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }

    pub fn halted(&self) -> Option<&PolicyError> {
        self.halted.as_ref()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    fn halt(&mut self, err: PolicyError) {
        error!("{} halted: {}", self.id(), err);
        self.inbox.clear();
        self.halted = Some(err);
    }

    /// Ask the policy whether to mine; if so, build on its chosen parent and
    /// insert the block locally.
    fn try_mine(&mut self, tick: u64) -> Result<Option<Block>, PolicyError> {
        if !self.policy.should_mine_block()? {
            return Ok(None);
        }
        let parent_hash = self.policy.choose_parent_block()?;
        let node_id = self.policy.node_id().to_string();

        let chain = self.policy.context_mut().chain_mut()?;
        let Some(parent) = chain.get(&parent_hash) else {
            return Err(PolicyError::InvalidParentChoice {
                node_id,
                parent_hash,
            });
        };
        let block = Block::new(parent, &node_id, tick, String::new());
        chain.add_block(block.clone());
        self.stats.mined += 1;

        info!(
            "{} mined {} at height {} (hash={})",
            node_id, block.block_id, block.height, block.hash
        );
        Ok(Some(block))
    }
}

/// Discrete-tick driver for a set of nodes.
///
/// Each tick runs two phases: every live node is asked whether to mine,
/// then every live node drains the blocks sent to it during earlier ticks.
/// Anything sent during tick `t` is delivered during tick `t + 1`.
pub struct Simulation {
    run_id: String,
    tick: u64,
    nodes: Vec<Node>,
    total_mined: u64,
}

impl Simulation {
    /// Build `node-0..node-N` from the configured kinds, each bound to a
    /// fresh genesis-only chain state.
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        config.policy.validate()?;
        if config.nodes.is_empty() {
            return Err(ConfigError::Invalid("at least one node is required".into()));
        }

        let policies = config
            .nodes
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let mut policy = kind.build(&format!("node-{i}"), &config.policy);
                policy.bind(ChainState::new());
                policy
            })
            .collect();
        Ok(Self::from_policies(policies))
    }

    /// Drive already constructed policies. Binding is left to the caller.
    pub fn from_policies(policies: Vec<Box<dyn Policy>>) -> Self {
        let run_id = Uuid::new_v4().to_string();
        info!("simulation {} starting with {} nodes", run_id, policies.len());
        Self {
            run_id,
            tick: 0,
            nodes: policies.into_iter().map(Node::new).collect(),
            total_mined: 0,
        }
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
        info!(
            "simulation {} reached tick {} ({} blocks mined)",
            self.run_id, self.tick, self.total_mined
        );
    }

    pub fn step(&mut self) {
        let tick = self.tick;
        let mut outbound: Vec<Broadcast> = Vec::new();

        // Phase 1: mining decisions.
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            if node.is_halted() {
                continue;
            }
            node.policy.set_tick(tick);
            match node.try_mine(tick) {
                Ok(Some(block)) => {
                    self.total_mined += 1;
                    outbound.push(Broadcast {
                        block,
                        from: idx,
                        skip: None,
                    });
                }
                Ok(None) => {}
                Err(err) => node.halt(err),
            }
        }

        // Phase 2: deliveries and relay decisions.
        for (idx, node) in self.nodes.iter_mut().enumerate() {
            if node.is_halted() {
                continue;
            }
            while let Some(envelope) = node.inbox.pop_front() {
                node.stats.received += 1;
                match node
                    .policy
                    .on_block_received(&envelope.block, &envelope.sender)
                {
                    Ok(true) => {
                        node.stats.relayed += 1;
                        outbound.push(Broadcast {
                            block: envelope.block,
                            from: idx,
                            skip: Some(envelope.from),
                        });
                    }
                    Ok(false) => {}
                    Err(err) => {
                        node.halt(err);
                        break;
                    }
                }
            }
        }

        self.dispatch(outbound);
        self.tick += 1;
    }

    fn dispatch(&mut self, outbound: Vec<Broadcast>) {
        for broadcast in outbound {
            let sender = self.nodes[broadcast.from].id().to_string();
            let mut fanout = 0usize;
            for (idx, node) in self.nodes.iter_mut().enumerate() {
                if idx == broadcast.from || Some(idx) == broadcast.skip || node.is_halted() {
                    continue;
                }
                node.inbox.push_back(Envelope {
                    block: broadcast.block.clone(),
                    sender: sender.clone(),
                    from: broadcast.from,
                });
                fanout += 1;
            }
            debug!(
                "{} -> {} peers: {}",
                sender, fanout, broadcast.block.block_id
            );
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Number of ticks completed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn total_mined(&self) -> u64 {
        self.total_mined
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id() == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{GreedyPolicy, PolicyConfig, PolicyContext};

    fn config(nodes: &[PolicyKind]) -> SimConfig {
        SimConfig {
            nodes: nodes.to_vec(),
            ..SimConfig::default()
        }
    }

    /// Always builds on a block nobody has.
    struct RoguePolicy {
        ctx: PolicyContext,
    }

    impl Policy for RoguePolicy {
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
            Ok(self.ctx.current_tick() == 3)
        }
        fn on_block_received(&mut self, _: &Block, _: &str) -> Result<bool, PolicyError> {
            Ok(false)
        }
        fn choose_parent_block(&mut self) -> Result<String, PolicyError> {
            Ok("no-such-block".into())
        }
    }

    #[test]
    fn greedy_network_stays_consistent() {
        let mut sim = Simulation::new(&config(&[PolicyKind::Greedy; 3])).unwrap();
        sim.run(20);

        assert_eq!(sim.tick(), 20);
        assert_eq!(sim.total_mined(), 60);
        for node in sim.nodes() {
            let chain = node.chain().unwrap();
            assert!(chain.is_consistent());
            assert_eq!(node.stats().mined, 20);
            // Everything except the last tick's broadcasts has arrived.
            assert_eq!(chain.len(), 1 + 20 + 2 * 19);
        }
    }

    #[test]
    fn blocks_propagate_to_silent_nodes() {
        let mut sim =
            Simulation::new(&config(&[PolicyKind::Interval, PolicyKind::Conservative])).unwrap();
        sim.run(12);

        // node-0 mined at tick 10; node-1 received it at tick 11.
        let conservative = sim.node("node-1").unwrap();
        assert_eq!(conservative.stats().received, 1);
        assert_eq!(conservative.stats().relayed, 0);
        let interval_head = &sim.node("node-0").unwrap().chain().unwrap().get_head().hash;
        assert!(conservative.chain().unwrap().contains(interval_head));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let mut cfg = config(&[PolicyKind::Lag, PolicyKind::Lag, PolicyKind::Adaptive]);
        cfg.policy.seed = 7;

        let heads = |cfg: &SimConfig| {
            let mut sim = Simulation::new(cfg).unwrap();
            sim.run(60);
            let heads: Vec<String> = sim
                .nodes()
                .iter()
                .map(|n| n.chain().unwrap().get_head().hash.clone())
                .collect();
            (sim.total_mined(), heads)
        };
        assert_eq!(heads(&cfg), heads(&cfg));
    }

    #[test]
    fn unbound_node_halts_alone() {
        let cfg = PolicyConfig::default();
        let mut bound = GreedyPolicy::new("node-0", &cfg);
        bound.bind(ChainState::new());
        let unbound = GreedyPolicy::new("node-1", &cfg);

        let policies: Vec<Box<dyn Policy>> = vec![Box::new(bound), Box::new(unbound)];
        let mut sim = Simulation::from_policies(policies);
        sim.run(5);

        let halted = sim.node("node-1").unwrap();
        assert_eq!(
            halted.halted(),
            Some(&PolicyError::UnboundState {
                node_id: "node-1".into()
            })
        );
        let live = sim.node("node-0").unwrap();
        assert!(!live.is_halted());
        assert_eq!(live.stats().mined, 5);
    }

    #[test]
    fn invalid_parent_halts_only_that_node() {
        let mut rogue = RoguePolicy {
            ctx: PolicyContext::new("node-1", 10),
        };
        rogue.bind(ChainState::new());
        let mut honest = GreedyPolicy::new("node-0", &PolicyConfig::default());
        honest.bind(ChainState::new());

        let policies: Vec<Box<dyn Policy>> = vec![Box::new(honest), Box::new(rogue)];
        let mut sim = Simulation::from_policies(policies);
        sim.run(6);

        assert!(matches!(
            sim.node("node-1").unwrap().halted(),
            Some(PolicyError::InvalidParentChoice { .. })
        ));
        assert_eq!(sim.node("node-1").unwrap().stats().mined, 0);
        assert_eq!(sim.node("node-0").unwrap().stats().mined, 6);
        assert_eq!(sim.total_mined(), 6);
    }
}
