use std::collections::VecDeque;

use common::BotLog;

/// Chronological activity log holding at most `cap` entries.
#[derive(Debug, Clone)]
pub struct BotLogBuffer {
    entries: VecDeque<BotLog>,
    cap: usize,
}

impl BotLogBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    /// Oldest entries are trimmed before the append so `len() <= cap` always holds.
    pub fn push(&mut self, log: BotLog) {
        while self.entries.len() >= self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(log);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<BotLog> {
        self.entries.iter().cloned().collect()
    }
}
