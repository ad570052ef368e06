//! Domain Services
//!
//! Pure hashing and sealing logic for the audit domain. Nothing in here
//! touches the chain, the queue, or the database.

use crate::domain::entities::{Block, OperationRecord};
use crate::domain::value_objects::ZERO_HASH;
use crate::error::{AuditError, AuditResult};
use chrono::{DateTime, Utc};
use platform::crypto::{sha256_hex, sha256_hex_concat};
use uuid::Uuid;

/// Content hash of an arbitrary JSON value (compact form, sorted keys)
pub fn content_hash_value(value: &serde_json::Value) -> String {
    sha256_hex(value.to_string().as_bytes())
}

/// Content hash identifying an operation record.
///
/// Covers the after-state, the recording time (millis, big-endian) and the
/// record's random id acting as a salt.
pub fn record_content_hash(
    after_state: &serde_json::Value,
    recorded_at: DateTime<Utc>,
    id: &Uuid,
) -> String {
    sha256_hex_concat(&[
        after_state.to_string().as_bytes(),
        &recorded_at.timestamp_millis().to_be_bytes(),
        id.as_bytes(),
    ])
}

/// Pairwise-hash reduction of record content hashes.
///
/// Odd levels duplicate their last node. An empty batch reduces to the
/// [`ZERO_HASH`] sentinel rather than an error.
pub fn merkle_root(record_hashes: &[String]) -> String {
    if record_hashes.is_empty() {
        return ZERO_HASH.to_string();
    }

    let mut level: Vec<String> = record_hashes.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(sha256_hex_concat(&[left.as_bytes(), right.as_bytes()]));
        }
        level = next;
    }
    level.swap_remove(0)
}

/// Hash of a block header: sequence number, sealed-at millis, record
/// content hashes in order, previous hash, nonce, merkle root.
pub fn compute_block_hash(
    sequence_number: u64,
    sealed_at: DateTime<Utc>,
    previous_hash: &str,
    nonce: u64,
    merkle_root: &str,
    record_hashes: &[String],
) -> String {
    let mut parts: Vec<&[u8]> = Vec::with_capacity(record_hashes.len() + 5);
    let seq_be = sequence_number.to_be_bytes();
    let sealed_at_be = sealed_at.timestamp_millis().to_be_bytes();
    let nonce_be = nonce.to_be_bytes();
    parts.push(&seq_be);
    parts.push(&sealed_at_be);
    for h in record_hashes {
        parts.push(h.as_bytes());
    }
    parts.push(previous_hash.as_bytes());
    parts.push(&nonce_be);
    parts.push(merkle_root.as_bytes());
    sha256_hex_concat(&parts)
}

/// Whether a hash meets the difficulty requirement
pub fn meets_difficulty(hash: &str, zeros: u8) -> bool {
    hash.len() >= zeros as usize && hash.bytes().take(zeros as usize).all(|b| b == b'0')
}

/// Seal a block: search nonces from 0 until the block hash carries the
/// required number of leading zero characters.
///
/// The batch is immutable during sealing, so the merkle root is computed
/// once up front. With `max_attempts = None` the search is unbounded; a
/// configured cap surfaces [`AuditError::SealTimeout`] instead of spinning
/// forever on a misconfigured difficulty.
pub fn seal_block(
    sequence_number: u64,
    sealed_at: DateTime<Utc>,
    records: Vec<OperationRecord>,
    previous_hash: String,
    difficulty: u8,
    max_attempts: Option<u64>,
) -> AuditResult<Block> {
    let record_hashes: Vec<String> = records.iter().map(|r| r.content_hash.clone()).collect();
    let merkle_root = merkle_root(&record_hashes);

    let mut nonce: u64 = 0;
    loop {
        let hash = compute_block_hash(
            sequence_number,
            sealed_at,
            &previous_hash,
            nonce,
            &merkle_root,
            &record_hashes,
        );
        if meets_difficulty(&hash, difficulty) {
            return Ok(Block {
                sequence_number,
                sealed_at,
                records,
                previous_hash,
                nonce,
                hash,
                merkle_root,
                difficulty,
            });
        }
        if let Some(cap) = max_attempts {
            if nonce + 1 >= cap {
                return Err(AuditError::SealTimeout { attempts: cap });
            }
        }
        nonce += 1;
    }
}
