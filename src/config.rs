//! Configuration for the transaction orchestrator
//!
//! All timing and retry knobs live here so callers can load them from their
//! own configuration files. Every field has a production default matching the
//! behavior described in the module docs.

use serde::Deserialize;
use std::time::Duration;

/// Tunables for one [`Account`](crate::tx::Account)'s orchestration loops.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Deadline for one submit-and-mine attempt while the account lock is held.
    pub attempt_timeout_secs: u64,
    /// Polling interval used while waiting for a submitted transaction to mine.
    pub mine_poll_interval_ms: u64,
    /// Initial delay before re-submitting after a failed post-condition check.
    pub post_backoff_initial_ms: u64,
    /// Growth factor applied to the post-condition delay after each round.
    pub post_backoff_multiplier: f64,
    /// Saturation point for the post-condition delay.
    pub post_backoff_cap_ms: u64,
    /// Delay between chain-head polls while waiting for confirmation depth.
    pub confirm_poll_delay_ms: u64,
    /// How many times to re-fetch the pending nonce when the network reports
    /// a nonce problem the retry engine cannot classify.
    pub nonce_recovery_attempts: u32,
    /// Pause between pending-nonce recovery attempts.
    pub nonce_recovery_interval_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: 60,
            mine_poll_interval_ms: 500,
            post_backoff_initial_ms: 1_000,
            post_backoff_multiplier: 1.6,
            post_backoff_cap_ms: 30_000,
            confirm_poll_delay_ms: 5,
            nonce_recovery_attempts: 60,
            nonce_recovery_interval_ms: 1_000,
        }
    }
}

impl OrchestratorConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn mine_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mine_poll_interval_ms)
    }

    pub fn confirm_poll_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_delay_ms)
    }

    pub fn nonce_recovery_interval(&self) -> Duration {
        Duration::from_millis(self.nonce_recovery_interval_ms)
    }
}
