//! Domain Entities
//!
//! Core entities for the audit domain. Both entities are immutable once
//! constructed; tampering is detected by recomputing their hashes from the
//! stored fields.

use crate::domain::services;
use crate::domain::value_objects::{OperationKind, ZERO_HASH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One logged business mutation (who changed what, and into which state).
///
/// Identity is the content hash over `(after_state, recorded_at, id)`; the
/// random v4 `id` doubles as the salt, so two operations with identical
/// payloads in the same millisecond still get distinct hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub id: Uuid,
    pub kind: OperationKind,
    pub actor_id: String,
    pub subject_table: String,
    pub subject_id: String,
    pub before_state: Option<Value>,
    pub after_state: Value,
    pub metadata: Option<Value>,
    pub recorded_at: DateTime<Utc>,
    pub content_hash: String,
}

impl OperationRecord {
    /// Create a new record, stamping `recorded_at` and the content hash.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: OperationKind,
        actor_id: String,
        subject_table: String,
        subject_id: String,
        before_state: Option<Value>,
        after_state: Value,
        metadata: Option<Value>,
    ) -> Self {
        let id = Uuid::new_v4();
        let recorded_at = Utc::now();
        let content_hash = services::record_content_hash(&after_state, recorded_at, &id);
        Self {
            id,
            kind,
            actor_id,
            subject_table,
            subject_id,
            before_state,
            after_state,
            metadata,
            recorded_at,
            content_hash,
        }
    }

    /// Recompute the content hash from the stored fields.
    ///
    /// Matches the stored `content_hash` unless `after_state` was mutated
    /// after the record was created.
    pub fn recompute_content_hash(&self) -> String {
        services::record_content_hash(&self.after_state, self.recorded_at, &self.id)
    }

    /// Whether this record describes `(subject_table, subject_id)`.
    pub fn subject_matches(&self, table: &str, id: &str) -> bool {
        self.subject_table == table && self.subject_id == id
    }
}

/// A sealed, hashed batch of operation records in the audit chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// 0-indexed position in the chain; genesis is 0.
    pub sequence_number: u64,
    pub sealed_at: DateTime<Utc>,
    pub records: Vec<OperationRecord>,
    /// Hash of the previous block; [`ZERO_HASH`] for genesis.
    pub previous_hash: String,
    pub nonce: u64,
    /// SHA-256 hex over every other field including the nonce.
    pub hash: String,
    /// Pairwise reduction of the record content hashes; [`ZERO_HASH`] when
    /// the batch is empty.
    pub merkle_root: String,
    /// Leading-zero requirement this block was sealed under.
    pub difficulty: u8,
}

impl Block {
    /// The fixed first block of every chain.
    ///
    /// Genesis carries no records and is not mined; proof-of-work applies
    /// to non-genesis blocks only.
    pub fn genesis(difficulty: u8) -> Self {
        let sealed_at = Utc::now();
        let hash = services::compute_block_hash(0, sealed_at, ZERO_HASH, 0, ZERO_HASH, &[]);
        Self {
            sequence_number: 0,
            sealed_at,
            records: Vec::new(),
            previous_hash: ZERO_HASH.to_string(),
            nonce: 0,
            hash,
            merkle_root: ZERO_HASH.to_string(),
            difficulty,
        }
    }

    /// Recompute this block's hash from its stored fields.
    ///
    /// Record content hashes are themselves recomputed from record state,
    /// so a mutated `after_state` anywhere in the batch changes the result.
    pub fn recompute_hash(&self) -> String {
        let record_hashes: Vec<String> = self
            .records
            .iter()
            .map(OperationRecord::recompute_content_hash)
            .collect();
        let merkle_root = services::merkle_root(&record_hashes);
        services::compute_block_hash(
            self.sequence_number,
            self.sealed_at,
            &self.previous_hash,
            self.nonce,
            &merkle_root,
            &record_hashes,
        )
    }

    /// Recompute the merkle root from the stored records.
    pub fn recompute_merkle_root(&self) -> String {
        let record_hashes: Vec<String> = self
            .records
            .iter()
            .map(OperationRecord::recompute_content_hash)
            .collect();
        services::merkle_root(&record_hashes)
    }

    pub fn is_genesis(&self) -> bool {
        self.sequence_number == 0
    }
}
