pub mod config;
pub mod network;
pub mod report;

pub use config::SimConfig;
pub use network::{Node, NodeStats, Simulation};
pub use report::{NodeReport, SimulationReport};
