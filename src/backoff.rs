//! Saturating exponential backoff for the post-condition re-submission loop

use std::time::Duration;

/// Yields a non-decreasing sequence of delays, growing geometrically from an
/// initial value and saturating at a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    current_ms: u64,
    multiplier: f64,
    cap_ms: u64,
}

impl Backoff {
    pub fn new(initial_ms: u64, multiplier: f64, cap_ms: u64) -> Self {
        Self {
            current_ms: initial_ms.min(cap_ms),
            multiplier,
            cap_ms,
        }
    }

    /// Return the next delay and advance the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_ms);
        let grown = (self.current_ms as f64 * self.multiplier) as u64;
        self.current_ms = grown.min(self.cap_ms);
        delay
    }
}
