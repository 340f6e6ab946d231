use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::blockchain::Block;
use crate::policy::JournalEntry;
use crate::sim::Simulation;

/// Largest number of ticks a single run request may advance.
pub const MAX_TICKS_PER_REQUEST: u64 = 10_000;

/// Shared application state: the simulation being inspected.
pub struct AppState {
    pub simulation: Mutex<Simulation>,
}

impl AppState {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            simulation: Mutex::new(simulation),
        }
    }
}

/* ---------- Run API Models ---------- */

#[derive(Deserialize)]
pub struct RunRequest {
    pub ticks: u64,
}

/* ---------- Node API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub node_id: &'a str,
    pub height: u64,
    pub has_fork: bool,
    pub tips: Vec<&'a str>, // hashes, best first
    pub chain: Vec<&'a Block>,
}

#[derive(Serialize)]
pub struct LogsResponse<'a> {
    pub node_id: &'a str,
    pub dropped: usize,
    pub entries: &'a [JournalEntry],
}
