//! PostgreSQL Repository Implementation
//!
//! One row per sealed block; the record batch travels as JSONB. The table
//! is a durability mirror of the in-memory chain, used for rehydration on
//! startup and offline integrity checks, never as the live source of truth.

use crate::domain::entities::Block;
use crate::domain::repository::BlockRepository;
use crate::error::AuditResult;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed block repository
#[derive(Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of persisted blocks. Startup logging only.
    pub async fn count_blocks(&self) -> AuditResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM audit_blocks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl BlockRepository for PgAuditRepository {
    async fn save_block(&self, block: &Block) -> AuditResult<()> {
        let records = serde_json::to_value(&block.records)?;

        // ON CONFLICT DO NOTHING keeps the at-least-once write-back
        // idempotent per sequence number.
        sqlx::query(
            r#"
            INSERT INTO audit_blocks (
                sequence_number,
                sealed_at,
                records,
                previous_hash,
                hash,
                nonce,
                merkle_root,
                difficulty
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (sequence_number) DO NOTHING
            "#,
        )
        .bind(block.sequence_number as i64)
        .bind(block.sealed_at)
        .bind(records)
        .bind(&block.previous_hash)
        .bind(&block.hash)
        .bind(block.nonce as i64)
        .bind(&block.merkle_root)
        .bind(block.difficulty as i16)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            sequence_number = block.sequence_number,
            record_count = block.records.len(),
            "block saved"
        );

        Ok(())
    }

    async fn load_blocks(&self) -> AuditResult<Vec<Block>> {
        let rows = sqlx::query_as::<_, BlockRow>(
            r#"
            SELECT
                sequence_number,
                sealed_at,
                records,
                previous_hash,
                hash,
                nonce,
                merkle_root,
                difficulty
            FROM audit_blocks
            ORDER BY sequence_number ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BlockRow::into_block).collect()
    }

    async fn record_dead_letter(&self, block: &Block, reason: &str) -> AuditResult<()> {
        let payload = serde_json::to_value(block)?;

        sqlx::query(
            r#"
            INSERT INTO audit_dead_letters (id, sequence_number, payload, reason)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(block.sequence_number as i64)
        .bind(payload)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        tracing::warn!(
            sequence_number = block.sequence_number,
            reason = %reason,
            "block dead-lettered"
        );

        Ok(())
    }
}

// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct BlockRow {
    sequence_number: i64,
    sealed_at: DateTime<Utc>,
    records: serde_json::Value,
    previous_hash: String,
    hash: String,
    nonce: i64,
    merkle_root: String,
    difficulty: i16,
}

impl BlockRow {
    fn into_block(self) -> AuditResult<Block> {
        Ok(Block {
            sequence_number: self.sequence_number as u64,
            sealed_at: self.sealed_at,
            records: serde_json::from_value(self.records)?,
            previous_hash: self.previous_hash,
            hash: self.hash,
            nonce: self.nonce as u64,
            merkle_root: self.merkle_root,
            difficulty: self.difficulty as u8,
        })
    }
}
