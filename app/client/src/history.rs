//! Conversation history replayed with every query.

use crate::message::MessageList;
use protocol::HistoryEntry;

/// Default number of most recent messages replayed per query.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Builds the history snapshot carried by each outgoing query.
#[derive(Debug, Clone, Copy)]
pub struct HistoryBuffer {
    limit: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryBuffer {
    /// Keep at most `limit` most recent entries. `0` keeps everything.
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Closed messages in chronological order, most recent `limit` only.
    ///
    /// The message still being composed is left out.
    pub fn snapshot(&self, messages: &MessageList) -> Vec<HistoryEntry> {
        let closed: Vec<_> = messages.iter().filter(|m| !m.is_open()).collect();
        let skip = match self.limit {
            0 => 0,
            limit => closed.len().saturating_sub(limit),
        };
        closed[skip..].iter().map(|m| m.to_history()).collect()
    }
}
