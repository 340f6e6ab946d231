//! Pluggable node policies for simulating blockchain consensus.

pub mod api;
pub mod blockchain;
pub mod error;
pub mod policy;
pub mod sim;

pub use blockchain::{Block, ChainState};
pub use error::{ConfigError, PolicyError};
pub use policy::{Policy, PolicyConfig, PolicyKind};
pub use sim::{SimConfig, Simulation, SimulationReport};
