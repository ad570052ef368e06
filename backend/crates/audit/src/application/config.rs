//! Application Configuration

use crate::domain::value_objects::Difficulty;
use std::time::Duration;

/// Audit application configuration
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Required leading `'0'` hex characters in a sealed block's hash
    pub difficulty: u8,
    /// Queue length that triggers an immediate seal
    pub max_batch_size: usize,
    /// Cadence of the timer-driven sealer
    pub seal_interval: Duration,
    /// Write-back attempts before a block is dead-lettered
    pub persist_max_retries: u32,
    /// Base backoff between write-back attempts (scaled linearly)
    pub persist_retry_backoff: Duration,
    /// Optional cap on nonce attempts. `None` means the search is
    /// unbounded, which is the reference behavior.
    pub max_seal_attempts: Option<u64>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::DEFAULT.zeros(),
            max_batch_size: 10,
            seal_interval: Duration::from_secs(30),
            persist_max_retries: 3,
            persist_retry_backoff: Duration::from_millis(500),
            max_seal_attempts: None,
        }
    }
}

impl AuditConfig {
    /// Config for development: cheap difficulty and a fast timer so sealed
    /// blocks show up quickly.
    pub fn development() -> Self {
        Self {
            difficulty: 2,
            seal_interval: Duration::from_secs(5),
            ..Default::default()
        }
    }

    pub fn seal_interval_ms(&self) -> i64 {
        self.seal_interval.as_millis() as i64
    }
}
