//! HTTP Handlers

use crate::application::service::{AuditService, RecordOperationInput};
use crate::domain::repository::BlockRepository;
use crate::error::AuditResult;
use crate::presentation::dto::{
    RecordRequest, RecordResponse, SealResponse, SealedBlockDto, StatsResponse, ValidationResponse,
    VerifyRequest, VerifyResponse,
};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Shared state for audit handlers
#[derive(Clone)]
pub struct AuditAppState<R>
where
    R: BlockRepository + Clone + Send + Sync + 'static,
{
    pub service: AuditService<R>,
}

/// POST /api/audit/record
///
/// Called by business-logic handlers after a mutation commits. Never fails
/// for well-formed input; the returned id correlates the operation with the
/// block it eventually lands in.
pub async fn record_operation<R>(
    State(state): State<AuditAppState<R>>,
    Json(req): Json<RecordRequest>,
) -> AuditResult<impl IntoResponse>
where
    R: BlockRepository + Clone + Send + Sync + 'static,
{
    let input = RecordOperationInput {
        kind: req.kind,
        actor_id: req.actor_id,
        subject_table: req.subject_table,
        subject_id: req.subject_id,
        before_state: req.before_state,
        after_state: req.after_state,
        metadata: req.metadata,
    };

    let operation_id = state.service.record(input)?;

    Ok((
        StatusCode::CREATED,
        Json(RecordResponse { operation_id }),
    ))
}

/// POST /api/audit/verify
pub async fn verify_integrity<R>(
    State(state): State<AuditAppState<R>>,
    Json(req): Json<VerifyRequest>,
) -> AuditResult<Json<VerifyResponse>>
where
    R: BlockRepository + Clone + Send + Sync + 'static,
{
    let outcome = state
        .service
        .verify(&req.subject_table, &req.subject_id, &req.current_data);

    Ok(Json(VerifyResponse {
        verified: outcome.verified,
        reason: outcome.reason,
    }))
}

/// GET /api/audit/stats
pub async fn chain_stats<R>(
    State(state): State<AuditAppState<R>>,
) -> AuditResult<Json<StatsResponse>>
where
    R: BlockRepository + Clone + Send + Sync + 'static,
{
    let stats = state.service.stats();

    Ok(Json(StatsResponse {
        chain_length: stats.chain_length,
        pending_count: stats.pending_count,
        last_hash: stats.last_hash,
        is_valid: stats.is_valid,
        total_records: stats.total_records,
    }))
}

/// POST /api/audit/seal (administrative force-seal)
pub async fn force_seal<R>(
    State(state): State<AuditAppState<R>>,
) -> AuditResult<Json<SealResponse>>
where
    R: BlockRepository + Clone + Send + Sync + 'static,
{
    let summary = state.service.force_seal().await?;

    Ok(Json(SealResponse {
        sealed: summary.is_some(),
        block: summary.map(|s| SealedBlockDto {
            sequence_number: s.sequence_number,
            hash: s.hash,
            record_count: s.record_count,
        }),
    }))
}

/// GET /api/audit/validate
pub async fn validate_chain<R>(
    State(state): State<AuditAppState<R>>,
) -> AuditResult<Json<ValidationResponse>>
where
    R: BlockRepository + Clone + Send + Sync + 'static,
{
    let report = state.service.validation_report();
    Ok(Json(ValidationResponse::from(report)))
}
