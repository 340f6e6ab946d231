use serde::Serialize;
use std::collections::BTreeMap;

use super::{Node, Simulation};
use crate::policy::PolicyKind;

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node_id: String,
    pub policy: PolicyKind,
    pub height: u64,
    pub known_blocks: usize,
    pub orphans: usize,
    pub tips: usize,
    pub has_fork: bool,
    pub head: Option<String>,
    pub mined: u64,
    pub received: u64,
    pub relayed: u64,
    pub journal_dropped: usize,
    pub halted: Option<String>,
}

impl NodeReport {
    fn capture(node: &Node) -> Self {
        let stats = node.stats();
        let chain = node.chain();
        Self {
            node_id: node.id().to_string(),
            policy: node.kind(),
            height: chain.map(|c| c.height()).unwrap_or_default(),
            known_blocks: chain.map(|c| c.len()).unwrap_or_default(),
            orphans: chain.map(|c| c.orphan_count()).unwrap_or_default(),
            tips: chain.map(|c| c.get_all_tips().len()).unwrap_or_default(),
            has_fork: chain.map(|c| c.has_fork()).unwrap_or(false),
            head: chain.map(|c| c.get_head().hash.clone()),
            mined: stats.mined,
            received: stats.received,
            relayed: stats.relayed,
            journal_dropped: node.policy().context().journal().dropped(),
            halted: node.halted().map(|e| e.to_string()),
        }
    }
}

/// Snapshot of a run: per-node views plus network-wide agreement.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub run_id: String,
    pub ticks: u64,
    pub total_mined: u64,
    /// Head held by the most live nodes (smallest hash on ties).
    pub consensus_head: Option<String>,
    /// Share of live nodes holding `consensus_head`.
    pub agreement: f64,
    /// Height of `consensus_head`.
    pub main_chain_length: u64,
    /// Share of mined blocks that did not end up on the consensus chain.
    pub stale_rate: f64,
    pub nodes: Vec<NodeReport>,
}

impl SimulationReport {
    pub fn capture(sim: &Simulation) -> Self {
        let nodes: Vec<NodeReport> = sim.nodes().iter().map(NodeReport::capture).collect();

        let mut votes: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
        for node in nodes.iter().filter(|n| n.halted.is_none()) {
            if let Some(head) = node.head.as_deref() {
                let entry = votes.entry(head).or_insert((0, node.height));
                entry.0 += 1;
            }
        }
        let live = votes.values().map(|(count, _)| count).sum::<usize>();

        // BTreeMap order makes the first maximum the smallest hash.
        let mut best: Option<(&str, usize, u64)> = None;
        for (head, (count, height)) in &votes {
            if best.is_none_or(|(_, c, _)| *count > c) {
                best = Some((*head, *count, *height));
            }
        }

        let (consensus_head, agreement, main_chain_length) = match best {
            Some((head, count, height)) => (
                Some(head.to_string()),
                count as f64 / live as f64,
                height,
            ),
            None => (None, 0.0, 0),
        };
        let stale_rate = if sim.total_mined() == 0 {
            0.0
        } else {
            (1.0 - main_chain_length as f64 / sim.total_mined() as f64).max(0.0)
        };

        Self {
            run_id: sim.run_id().to_string(),
            ticks: sim.tick(),
            total_mined: sim.total_mined(),
            consensus_head,
            agreement,
            main_chain_length,
            stale_rate,
            nodes,
        }
    }
}

impl Simulation {
    pub fn report(&self) -> SimulationReport {
        SimulationReport::capture(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::policy::PolicyKind;
    use crate::sim::{SimConfig, Simulation};

    #[test]
    fn fresh_network_agrees_on_genesis() {
        let sim = Simulation::new(&SimConfig::default()).unwrap();
        let report = sim.report();

        assert_eq!(report.nodes.len(), PolicyKind::ALL.len());
        assert_eq!(report.agreement, 1.0);
        assert_eq!(report.main_chain_length, 0);
        assert_eq!(report.stale_rate, 0.0);
        assert!(report.nodes.iter().all(|n| n.tips == 1 && !n.has_fork));
    }

    #[test]
    fn mixed_network_report_is_coherent() {
        let mut sim = Simulation::new(&SimConfig::default()).unwrap();
        sim.run(200);
        let report = sim.report();

        assert_eq!(report.ticks, 200);
        let mined: u64 = report.nodes.iter().map(|n| n.mined).sum();
        assert_eq!(mined, report.total_mined);
        assert!(report.main_chain_length <= report.total_mined);
        assert!(report.agreement > 0.0 && report.agreement <= 1.0);
        assert!((0.0..=1.0).contains(&report.stale_rate));
        assert!(report.consensus_head.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["nodes"][0]["policy"], "greedy");
    }
}
