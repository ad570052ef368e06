//! API DTOs (Data Transfer Objects)

use crate::domain::chain::ChainReport;
use crate::domain::value_objects::OperationKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Request for POST /api/audit/record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    pub kind: OperationKind,
    pub actor_id: String,
    pub subject_table: String,
    pub subject_id: String,
    #[serde(default)]
    pub before_state: Option<Value>,
    pub after_state: Value,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Response for POST /api/audit/record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub operation_id: Uuid,
}

/// Request for POST /api/audit/verify
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub subject_table: String,
    pub subject_id: String,
    pub current_data: Value,
}

/// Response for POST /api/audit/verify
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Response for GET /api/audit/stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub chain_length: u64,
    pub pending_count: usize,
    pub last_hash: String,
    pub is_valid: bool,
    pub total_records: u64,
}

/// Summary of a block sealed by POST /api/audit/seal
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedBlockDto {
    pub sequence_number: u64,
    pub hash: String,
    pub record_count: usize,
}

/// Response for POST /api/audit/seal
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SealResponse {
    /// False when the queue was empty or another seal was in flight
    pub sealed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<SealedBlockDto>,
}

/// Response for GET /api/audit/validate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub is_valid: bool,
    pub blocks: Vec<BlockCheckDto>,
}

/// Per-block entry of the validation report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCheckDto {
    pub sequence_number: u64,
    pub hash_ok: bool,
    pub linkage_ok: bool,
    pub pow_ok: bool,
}

impl From<ChainReport> for ValidationResponse {
    fn from(report: ChainReport) -> Self {
        Self {
            is_valid: report.is_valid,
            blocks: report
                .blocks
                .into_iter()
                .map(|c| BlockCheckDto {
                    sequence_number: c.sequence_number,
                    hash_ok: c.hash_ok,
                    linkage_ok: c.linkage_ok,
                    pow_ok: c.pow_ok,
                })
                .collect(),
        }
    }
}
