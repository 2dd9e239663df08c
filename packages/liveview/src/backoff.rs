//! Reconnect pacing.

use std::time::Duration;

/// Delays between reconnect attempts, capped at the last entry.
const SCHEDULE: [u64; 5] = [1, 2, 5, 10, 30];

/// 1s, 2s, 5s, 10s, 30s, 30s, ... Reset whenever any frame arrives.
#[derive(Debug, Default, Clone)]
pub struct ReconnectBackoff {
    attempt: usize,
}

impl ReconnectBackoff {
    pub fn new() -> ReconnectBackoff {
        ReconnectBackoff::default()
    }

    /// Delay before the next attempt; advances the counter.
    pub fn next_delay(&mut self) -> Duration {
        let secs = SCHEDULE[self.attempt.min(SCHEDULE.len() - 1)];
        self.attempt += 1;
        Duration::from_secs(secs)
    }

    /// Any successfully received frame counts as liveness.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> usize {
        self.attempt
    }
}
