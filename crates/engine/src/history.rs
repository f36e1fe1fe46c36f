use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use common::{Analysis, SignalLog, MAX_HISTORY};

/// Most recent tradeable analyses, newest first.
#[derive(Debug, Clone)]
pub struct SignalHistory {
    entries: VecDeque<SignalLog>,
    cap: usize,
}

impl Default for SignalHistory {
    fn default() -> Self {
        Self::new(MAX_HISTORY)
    }
}

impl SignalHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    /// Record a completed analysis. WAIT results are ignored and return `None`.
    pub fn record(
        &mut self,
        analysis: Analysis,
        id: u64,
        timestamp: DateTime<Utc>,
    ) -> Option<&SignalLog> {
        if !analysis.signal.is_tradeable() {
            return None;
        }
        self.entries.push_front(SignalLog {
            id,
            timestamp,
            analysis,
        });
        self.entries.truncate(self.cap);
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest first.
    pub fn entries(&self) -> Vec<SignalLog> {
        self.entries.iter().cloned().collect()
    }
}
