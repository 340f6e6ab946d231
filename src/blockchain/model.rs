use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::{Block, MAX_ORPHANS};

/// One node's local, fork-aware view of the block tree.
///
/// Blocks are only ever added. The canonical head is the highest block;
/// ties at equal height go to the lexicographically smallest hash so that
/// nodes observing the same block set always agree on the head.
#[derive(Debug, Clone)]
pub struct ChainState {
    blocks: HashMap<String, Block>,
    by_height: BTreeMap<u64, BTreeSet<String>>,
    tips: BTreeSet<String>,
    head: String,
    genesis: String,
    // parent hash -> blocks waiting for that parent
    orphans: HashMap<String, Vec<Block>>,
    // orphan hash -> parent hash
    orphan_index: HashMap<String, String>,
    // (height, hash) of every orphan; the highest is evicted first
    orphan_heights: BTreeSet<(u64, String)>,
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainState {
    /// Initialize a chain state holding only the genesis block.
    pub fn new() -> Self {
        let genesis = Block::genesis();
        let hash = genesis.hash.clone();

        let mut state = Self {
            blocks: HashMap::new(),
            by_height: BTreeMap::new(),
            tips: BTreeSet::new(),
            head: hash.clone(),
            genesis: hash.clone(),
            orphans: HashMap::new(),
            orphan_index: HashMap::new(),
            orphan_heights: BTreeSet::new(),
        };
        state.by_height.entry(0).or_default().insert(hash.clone());
        state.tips.insert(hash.clone());
        state.blocks.insert(hash, genesis);
        state
    }

    /// Insert a block. Returns `true` only if the block was newly attached.
    ///
    /// Duplicates (attached or buffered) are a no-op returning `false`.
    /// A block with an unknown parent is buffered and attached later, once
    /// its parent arrives; until then it is not integrated and this returns
    /// `false`.
    pub fn add_block(&mut self, block: Block) -> bool {
        if self.blocks.contains_key(&block.hash) || self.orphan_index.contains_key(&block.hash) {
            debug!("duplicate block {} ignored", block.block_id);
            return false;
        }

        let parent_height = match self.blocks.get(&block.parent_hash) {
            Some(parent) => parent.height,
            None => {
                self.buffer_orphan(block);
                return false;
            }
        };

        if block.height != parent_height + 1 {
            warn!(
                "rejected block {}: height {} does not follow parent height {}",
                block.block_id, block.height, parent_height
            );
            return false;
        }

        let hash = block.hash.clone();
        self.attach(block);
        self.adopt_orphans(&hash);
        true
    }

    /// The canonical head: highest block, smallest hash on ties.
    pub fn get_head(&self) -> &Block {
        self.blocks
            .get(&self.head)
            .expect("head always refers to a known block")
    }

    /// Every block without a known child, highest first (smallest hash first
    /// within a height).
    pub fn get_all_tips(&self) -> Vec<&Block> {
        let mut tips: Vec<&Block> = self
            .tips
            .iter()
            .filter_map(|hash| self.blocks.get(hash))
            .collect();
        tips.sort_by(|a, b| rank(a, b));
        tips
    }

    /// The tip with the greatest height, smallest hash on ties.
    pub fn best_tip(&self) -> &Block {
        self.tips
            .iter()
            .filter_map(|hash| self.blocks.get(hash))
            .min_by(|a, b| rank(a, b))
            .unwrap_or_else(|| self.get_head())
    }

    pub fn has_fork(&self) -> bool {
        self.tips.len() > 1
    }

    /// Canonical chain from genesis up to the head.
    pub fn get_main_chain(&self) -> Vec<&Block> {
        let mut chain = Vec::with_capacity(self.height() as usize + 1);
        let mut cursor = self.blocks.get(&self.head);
        while let Some(block) = cursor {
            chain.push(block);
            if block.hash == self.genesis {
                break;
            }
            cursor = self.blocks.get(&block.parent_hash);
        }
        chain.reverse();
        chain
    }

    /// Height of the canonical head.
    pub fn height(&self) -> u64 {
        self.get_head().height
    }

    /// Hashes of attached blocks grouped by height.
    pub fn blocks_by_height(&self) -> &BTreeMap<u64, BTreeSet<String>> {
        &self.by_height
    }

    pub fn blocks_at_height(&self, height: u64) -> Vec<&Block> {
        self.by_height
            .get(&height)
            .map(|hashes| hashes.iter().filter_map(|h| self.blocks.get(h)).collect())
            .unwrap_or_default()
    }

    pub fn genesis(&self) -> &Block {
        self.blocks
            .get(&self.genesis)
            .expect("genesis is inserted at construction")
    }

    pub fn get(&self, hash: &str) -> Option<&Block> {
        self.blocks.get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.blocks.contains_key(hash)
    }

    /// Number of attached blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn orphan_count(&self) -> usize {
        self.orphan_index.len()
    }

    /// Re-derive linkage, tips, height index and head from scratch and
    /// compare them against the incremental bookkeeping.
    pub fn is_consistent(&self) -> bool {
        let mut has_child: HashSet<&str> = HashSet::new();
        for block in self.blocks.values() {
            if block.hash == self.genesis {
                continue;
            }
            let Some(parent) = self.blocks.get(&block.parent_hash) else {
                return false;
            };
            if block.height != parent.height + 1 {
                return false;
            }
            has_child.insert(parent.hash.as_str());
        }

        let derived_tips: BTreeSet<String> = self
            .blocks
            .keys()
            .filter(|hash| !has_child.contains(hash.as_str()))
            .cloned()
            .collect();
        if derived_tips != self.tips {
            return false;
        }

        let indexed: usize = self.by_height.values().map(BTreeSet::len).sum();
        if indexed != self.blocks.len() {
            return false;
        }
        let misplaced = self.by_height.iter().any(|(height, hashes)| {
            hashes
                .iter()
                .any(|h| self.blocks.get(h).map(|b| b.height) != Some(*height))
        });
        if misplaced {
            return false;
        }

        let best = self
            .blocks
            .values()
            .min_by(|a, b| rank(a, b));
        best.map(|b| b.hash == self.head).unwrap_or(false)
    }

    /* -------------------- Helpers -------------------- */

    fn attach(&mut self, block: Block) {
        let hash = block.hash.clone();
        self.tips.remove(&block.parent_hash);
        self.tips.insert(hash.clone());
        self.by_height
            .entry(block.height)
            .or_default()
            .insert(hash.clone());

        let head = self.get_head();
        let outranks =
            block.height > head.height || (block.height == head.height && block.hash < head.hash);
        if outranks {
            self.head = hash.clone();
        }

        debug!(
            "attached block {} at height {} (tips={})",
            block.block_id,
            block.height,
            self.tips.len()
        );
        self.blocks.insert(hash, block);
    }

    /// Attach every buffered descendant of `hash`, transitively.
    fn adopt_orphans(&mut self, hash: &str) {
        let mut ready = vec![hash.to_string()];
        while let Some(parent_hash) = ready.pop() {
            let Some(waiting) = self.orphans.remove(&parent_hash) else {
                continue;
            };
            let parent_height = match self.blocks.get(&parent_hash) {
                Some(parent) => parent.height,
                None => continue,
            };

            for child in waiting {
                self.orphan_index.remove(&child.hash);
                self.orphan_heights
                    .remove(&(child.height, child.hash.clone()));

                if child.height != parent_height + 1 {
                    warn!(
                        "dropped orphan {}: height {} does not follow parent height {}",
                        child.block_id, child.height, parent_height
                    );
                    continue;
                }
                let child_hash = child.hash.clone();
                self.attach(child);
                ready.push(child_hash);
            }
        }
    }

    /// Buffer a block whose parent is unknown.
    ///
    /// When the buffer is full the highest orphan goes, which may be the
    /// incoming block itself. Low orphans are the ones a single missing
    /// parent can unlock, so a full buffer never strands a whole run.
    fn buffer_orphan(&mut self, block: Block) {
        if self.orphan_index.len() >= MAX_ORPHANS {
            let incoming = (block.height, block.hash.clone());
            match self.orphan_heights.last().cloned() {
                Some(highest) if highest > incoming => self.drop_orphan(&highest),
                _ => {
                    warn!("orphan buffer full, dropped {}", block.block_id);
                    return;
                }
            }
        }

        debug!(
            "buffered orphan {} (parent {} unknown)",
            block.block_id, block.parent_hash
        );
        self.orphan_heights
            .insert((block.height, block.hash.clone()));
        self.orphan_index
            .insert(block.hash.clone(), block.parent_hash.clone());
        self.orphans
            .entry(block.parent_hash.clone())
            .or_default()
            .push(block);
    }

    fn drop_orphan(&mut self, key: &(u64, String)) {
        let (_, hash) = key;
        self.orphan_heights.remove(key);
        let Some(parent) = self.orphan_index.remove(hash) else {
            return;
        };
        if let Some(waiting) = self.orphans.get_mut(&parent) {
            waiting.retain(|b| &b.hash != hash);
            if waiting.is_empty() {
                self.orphans.remove(&parent);
            }
        }
        warn!("orphan buffer full, dropped {hash}");
    }
}

/// Head ordering: greater height first, then smaller hash.
fn rank(a: &Block, b: &Block) -> Ordering {
    b.height.cmp(&a.height).then_with(|| a.hash.cmp(&b.hash))
}

#[cfg(test)]
mod tests {
    use super::ChainState;
    use crate::blockchain::{Block, MAX_ORPHANS};
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

    fn child(parent: &Block, miner: &str, tick: u64) -> Block {
        Block::new(parent, miner, tick, String::new())
    }

    #[test]
    fn genesis_only_state_has_single_tip() {
        let chain = ChainState::new();
        let tips = chain.get_all_tips();
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].hash, chain.genesis().hash);
        assert!(!chain.has_fork());
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.get_main_chain().len(), 1);
    }

    #[test]
    fn sibling_blocks_fork_with_order_independent_head() {
        let genesis = Block::genesis();
        let b1 = child(&genesis, "node-1", 1);
        let b2 = child(&genesis, "node-2", 1);

        let mut forward = ChainState::new();
        assert!(forward.add_block(b1.clone()));
        assert!(forward.add_block(b2.clone()));

        let mut backward = ChainState::new();
        assert!(backward.add_block(b2.clone()));
        assert!(backward.add_block(b1.clone()));

        for chain in [&forward, &backward] {
            assert!(chain.has_fork());
            assert_eq!(chain.get_all_tips().len(), 2);
        }
        assert_eq!(forward.get_head().hash, backward.get_head().hash);

        let expected = if b1.hash < b2.hash { &b1 } else { &b2 };
        assert_eq!(forward.get_head().hash, expected.hash);
        assert_eq!(forward.best_tip().hash, expected.hash);
        assert_eq!(forward.get_all_tips()[0].hash, expected.hash);
    }

    #[test]
    fn duplicate_add_is_a_noop() {
        let genesis = Block::genesis();
        let b1 = child(&genesis, "node-1", 1);

        let mut chain = ChainState::new();
        assert!(chain.add_block(b1.clone()));
        assert!(!chain.add_block(b1));
        assert!(!chain.add_block(Block::genesis()));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn longer_branch_wins_the_head() {
        let genesis = Block::genesis();
        let a1 = child(&genesis, "a", 1);
        let b1 = child(&genesis, "b", 1);
        let b2 = child(&b1, "b", 2);

        let mut chain = ChainState::new();
        chain.add_block(a1.clone());
        chain.add_block(b1.clone());
        chain.add_block(b2.clone());

        assert_eq!(chain.get_head().hash, b2.hash);
        assert_eq!(chain.height(), 2);
        let main: Vec<&str> = chain.get_main_chain().iter().map(|b| b.hash.as_str()).collect();
        assert_eq!(main, vec![genesis.hash.as_str(), b1.hash.as_str(), b2.hash.as_str()]);
        assert_eq!(chain.blocks_at_height(1).len(), 2);
        assert!(chain.has_fork());
    }

    #[test]
    fn orphan_is_buffered_then_adopted() {
        let genesis = Block::genesis();
        let b1 = child(&genesis, "a", 1);
        let b2 = child(&b1, "a", 2);
        let b3 = child(&b2, "a", 3);

        let mut chain = ChainState::new();
        assert!(!chain.add_block(b3.clone()));
        assert!(!chain.add_block(b2.clone()));
        assert_eq!(chain.orphan_count(), 2);
        assert_eq!(chain.height(), 0);
        assert!(!chain.add_block(b3.clone()), "buffered orphan counts as known");

        assert!(chain.add_block(b1));
        assert_eq!(chain.orphan_count(), 0);
        assert_eq!(chain.get_head().hash, b3.hash);
        assert!(!chain.has_fork());
        assert!(chain.is_consistent());
    }

    #[test]
    fn height_mismatch_is_rejected() {
        let genesis = Block::genesis();
        let mut bad = child(&genesis, "a", 1);
        bad.height = 5;
        bad.hash = bad.compute_hash();

        let mut chain = ChainState::new();
        assert!(!chain.add_block(bad));
        assert_eq!(chain.len(), 1);
        assert!(chain.is_consistent());
    }

    #[test]
    fn head_is_stable_without_new_blocks() {
        let genesis = Block::genesis();
        let mut chain = ChainState::new();
        chain.add_block(child(&genesis, "a", 1));
        chain.add_block(child(&genesis, "b", 1));
        assert!(chain.has_fork());

        let first = chain.get_head().hash.clone();
        assert!(chain.is_consistent());
        let tips: Vec<String> = chain.get_all_tips().iter().map(|b| b.hash.clone()).collect();
        assert_eq!(chain.best_tip().hash, tips[0]);
        assert_eq!(chain.get_head().hash, first);
        assert_eq!(chain.get_head().hash, tips[0]);
    }

    #[test]
    fn full_orphan_buffer_keeps_the_lowest() {
        let genesis = Block::genesis();
        let mut run = vec![child(&genesis, "a", 1)];
        for tick in 2..=(MAX_ORPHANS as u64 + 6) {
            let next = child(&run[run.len() - 1], "a", tick);
            run.push(next);
        }
        let missing = run.remove(0);

        let mut chain = ChainState::new();
        for block in &run {
            assert!(!chain.add_block(block.clone()));
        }
        assert_eq!(chain.orphan_count(), MAX_ORPHANS);
        assert!(chain.is_consistent());

        assert!(chain.add_block(missing));
        assert_eq!(chain.orphan_count(), 0);
        assert_eq!(chain.height(), MAX_ORPHANS as u64 + 1);
        assert!(chain.is_consistent());

        // blocks dropped on overflow can be delivered again
        for block in &run[MAX_ORPHANS..] {
            assert!(chain.add_block(block.clone()));
        }
        assert_eq!(chain.height(), MAX_ORPHANS as u64 + 6);
        assert_eq!(chain.len(), MAX_ORPHANS + 7);
    }

    #[test]
    fn full_orphan_buffer_is_order_independent() {
        let genesis = Block::genesis();
        let mut run = vec![child(&genesis, "a", 1)];
        for tick in 2..=(MAX_ORPHANS as u64 + 6) {
            let next = child(&run[run.len() - 1], "a", tick);
            run.push(next);
        }
        let missing = run.remove(0);

        let mut chain = ChainState::new();
        for block in run.iter().rev() {
            chain.add_block(block.clone());
        }
        assert_eq!(chain.orphan_count(), MAX_ORPHANS);

        assert!(chain.add_block(missing));
        assert_eq!(chain.height(), MAX_ORPHANS as u64 + 1);
        assert!(chain.is_consistent());
    }

    fn random_tree(choices: &[usize]) -> Vec<Block> {
        let mut blocks = vec![Block::genesis()];
        for (i, c) in choices.iter().enumerate() {
            let parent = blocks[c % blocks.len()].clone();
            let miner = format!("m{}", c % 3);
            blocks.push(child(&parent, &miner, i as u64 + 1));
        }
        blocks.remove(0);
        blocks
    }

    proptest! {
        #[test]
        fn invariants_hold_after_every_insert(choices in prop::collection::vec(0usize..32, 1..40)) {
            let mut chain = ChainState::new();
            for block in random_tree(&choices) {
                let before = chain.len();
                let parent_height = chain.get(&block.parent_hash).map(|p| p.height);
                let height = block.height;
                prop_assert!(chain.add_block(block));
                prop_assert_eq!(chain.len(), before + 1);
                prop_assert_eq!(Some(height), parent_height.map(|h| h + 1));
                prop_assert!(chain.is_consistent());
                prop_assert_eq!(chain.has_fork(), chain.get_all_tips().len() > 1);
            }
            prop_assert_eq!(chain.len(), choices.len() + 1);
        }

        #[test]
        fn delivery_order_does_not_change_the_head(
            choices in prop::collection::vec(0usize..32, 1..40),
            seed in any::<u64>(),
        ) {
            let blocks = random_tree(&choices);

            let mut in_order = ChainState::new();
            for block in blocks.clone() {
                in_order.add_block(block);
            }

            let mut shuffled = blocks;
            shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
            let mut out_of_order = ChainState::new();
            for block in shuffled {
                out_of_order.add_block(block);
            }

            prop_assert_eq!(out_of_order.orphan_count(), 0);
            prop_assert_eq!(in_order.len(), out_of_order.len());
            prop_assert_eq!(&in_order.get_head().hash, &out_of_order.get_head().hash);
            prop_assert!(out_of_order.is_consistent());
        }
    }
}
