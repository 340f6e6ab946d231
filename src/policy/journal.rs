use chrono::Utc;
use serde::Serialize;

/// Longest message kept per entry, in chars.
pub const MAX_MESSAGE_CHARS: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub tick: u64,
    pub logged_at: i64, // Unix timestamp (UTC)
    pub message: String,
}

/// Size-limited per-node diagnostic log. Recording never influences a
/// policy decision; once `limit` entries are held, further ones are counted
/// and dropped.
#[derive(Debug, Clone)]
pub struct PolicyJournal {
    limit: usize,
    entries: Vec<JournalEntry>,
    dropped: usize,
}

impl PolicyJournal {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Vec::new(),
            dropped: 0,
        }
    }

    pub fn record(&mut self, tick: u64, message: &str) {
        if self.entries.len() >= self.limit {
            self.dropped += 1;
            return;
        }
        self.entries.push(JournalEntry {
            tick,
            logged_at: Utc::now().timestamp(),
            message: message.chars().take(MAX_MESSAGE_CHARS).collect(),
        });
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
