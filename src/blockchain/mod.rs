pub mod block;
pub mod model;

pub use block::Block;
pub use model::ChainState;

/// Parent hash recorded in the genesis block.
pub const GENESIS_PARENT: &str = "0";

/// Human-readable label of the genesis block.
pub const GENESIS_LABEL: &str = "genesis";

/// Upper bound on buffered orphans per node; the highest are dropped first.
pub const MAX_ORPHANS: usize = 1024;
