//! Repository Traits
//!
//! Interfaces for block persistence. Implementation is in the
//! infrastructure layer; tests substitute an in-memory variant.

use crate::domain::entities::Block;
use crate::error::AuditResult;

/// Block repository trait
#[trait_variant::make(BlockRepository: Send)]
pub trait LocalBlockRepository {
    /// Persist one sealed block. Must be idempotent per sequence number so
    /// the at-least-once write-back can retry safely.
    async fn save_block(&self, block: &Block) -> AuditResult<()>;

    /// Load every persisted block ordered by sequence number ascending.
    async fn load_blocks(&self) -> AuditResult<Vec<Block>>;

    /// Record a block whose write-back exhausted its retries.
    async fn record_dead_letter(&self, block: &Block, reason: &str) -> AuditResult<()>;
}
