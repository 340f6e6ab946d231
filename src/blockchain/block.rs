use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{GENESIS_LABEL, GENESIS_PARENT};

/// A single block in a node's view of the chain.
///
/// Blocks are created once by the node that mines them and are never
/// mutated afterwards; every node that learns about a block holds its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String, // Cached content hash (hex)
    pub parent_hash: String,
    pub height: u64, // parent.height + 1, 0 for genesis
    pub block_id: String,
    pub miner: String,
    pub tick: u64, // Tick at which the block was mined
    pub payload: String,
}

impl Block {
    /// Create the genesis block. Every node builds the exact same one, so
    /// independent chain states share a common root.
    pub fn genesis() -> Self {
        let mut block = Self {
            hash: String::new(),
            parent_hash: String::from(GENESIS_PARENT),
            height: 0,
            block_id: String::from(GENESIS_LABEL),
            miner: String::new(),
            tick: 0,
            payload: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Build a block on top of `parent`, mined by `miner` at `tick`.
    pub fn new(parent: &Block, miner: &str, tick: u64, payload: String) -> Self {
        let mut block = Self {
            hash: String::new(),
            parent_hash: parent.hash.clone(),
            height: parent.height + 1,
            block_id: format!("{miner}@{tick}"),
            miner: miner.to_string(),
            tick,
            payload,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Compute the SHA-256 hash of this block from its fields
    /// (excluding the `hash` field itself and the display label).
    pub fn compute_hash(&self) -> String {
        let preimage = format!(
            "{}:{}:{}:{}:{}",
            self.parent_hash, self.height, self.miner, self.tick, self.payload
        );
        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        let digest = hasher.finalize();
        hex::encode(digest)
    }

    /// Whether the cached `hash` matches the content. (Does NOT check linkage.)
    pub fn is_valid(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.parent_hash == GENESIS_PARENT
    }
}
