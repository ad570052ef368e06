//! Append-only chain of sealed blocks.
//!
//! The chain owns the ordered block sequence, enforces the linkage
//! invariants on append, and produces read-only validation reports. It is
//! plain data with no locking; the application layer serializes access.

use crate::domain::entities::{Block, OperationRecord};
use crate::domain::services;
use crate::domain::value_objects::ZERO_HASH;
use crate::error::{AuditError, AuditResult};
use serde::Serialize;

/// Per-block validation outcome: stored hash vs recomputed, previous-hash
/// linkage, and proof-of-work target.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCheck {
    pub sequence_number: u64,
    pub hash_ok: bool,
    pub linkage_ok: bool,
    pub pow_ok: bool,
}

impl BlockCheck {
    pub fn passed(&self) -> bool {
        self.hash_ok && self.linkage_ok && self.pow_ok
    }
}

/// Full-chain validation report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainReport {
    pub is_valid: bool,
    pub blocks: Vec<BlockCheck>,
}

/// The append-only ordered sequence of blocks. Never empty: index 0 is
/// always genesis.
#[derive(Debug)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Start a fresh chain containing only a new genesis block.
    pub fn bootstrap(difficulty: u8) -> Self {
        Self {
            blocks: vec![Block::genesis(difficulty)],
        }
    }

    /// Rehydrate a chain from persisted blocks.
    ///
    /// Only the structural shape is checked here (non-empty, contiguous
    /// sequence numbers from 0); hashes are re-validated on demand via
    /// [`Chain::validate`], not on every restart.
    pub fn from_blocks(blocks: Vec<Block>) -> AuditResult<Self> {
        if blocks.is_empty() {
            return Err(AuditError::ChainIntegrity(
                "cannot rehydrate from zero blocks; genesis is missing".into(),
            ));
        }
        for (index, block) in blocks.iter().enumerate() {
            if block.sequence_number != index as u64 {
                return Err(AuditError::ChainIntegrity(format!(
                    "stored block at position {} carries sequence number {}",
                    index, block.sequence_number
                )));
            }
        }
        Ok(Self { blocks })
    }

    /// The highest-sequence block. Total because genesis always exists.
    pub fn latest(&self) -> &Block {
        // Invariant: blocks is never empty
        self.blocks
            .last()
            .unwrap_or_else(|| unreachable!("chain always contains genesis"))
    }

    pub fn len(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Count of operation records across all sealed blocks.
    pub fn total_records(&self) -> u64 {
        self.blocks.iter().map(|b| b.records.len() as u64).sum()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Append a sealed block, enforcing sequence and linkage invariants.
    /// On failure the chain is left unchanged.
    pub fn append(&mut self, block: Block) -> AuditResult<()> {
        if block.sequence_number != self.len() {
            return Err(AuditError::ChainIntegrity(format!(
                "expected sequence number {}, got {}",
                self.len(),
                block.sequence_number
            )));
        }
        if block.previous_hash != self.latest().hash {
            return Err(AuditError::ChainIntegrity(format!(
                "previous hash of block {} does not match the chain tip",
                block.sequence_number
            )));
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Validate the whole chain. Read-only; never mutates.
    ///
    /// For every block: (a) the stored hash equals the hash recomputed from
    /// stored fields, (b) previous-hash linkage holds, (c) the proof-of-work
    /// target is met. Genesis is exempt from (c) and links to the zero
    /// sentinel for (b).
    pub fn validate(&self) -> ChainReport {
        let mut checks = Vec::with_capacity(self.blocks.len());
        for (index, block) in self.blocks.iter().enumerate() {
            let hash_ok = block.recompute_hash() == block.hash;
            let linkage_ok = if index == 0 {
                block.previous_hash == ZERO_HASH
            } else {
                block.previous_hash == self.blocks[index - 1].hash
            };
            let pow_ok = block.is_genesis()
                || services::meets_difficulty(&block.hash, block.difficulty);
            checks.push(BlockCheck {
                sequence_number: block.sequence_number,
                hash_ok,
                linkage_ok,
                pow_ok,
            });
        }
        ChainReport {
            is_valid: checks.iter().all(BlockCheck::passed),
            blocks: checks,
        }
    }

    /// Most recently sealed record for `(subject_table, subject_id)`,
    /// scanning newest blocks first.
    pub fn latest_state_for(&self, table: &str, id: &str) -> Option<&OperationRecord> {
        self.blocks
            .iter()
            .rev()
            .flat_map(|b| b.records.iter().rev())
            .find(|r| r.subject_matches(table, id))
    }
}
