//! Audit Router

use crate::application::service::AuditService;
use crate::domain::repository::BlockRepository;
use crate::infra::postgres::PgAuditRepository;
use crate::presentation::handlers::{self, AuditAppState};
use axum::{
    Router,
    routing::{get, post},
};

/// Create the audit router with the PostgreSQL repository
pub fn audit_router(service: AuditService<PgAuditRepository>) -> Router {
    audit_router_generic(service)
}

/// Create a generic audit router for any repository implementation
pub fn audit_router_generic<R>(service: AuditService<R>) -> Router
where
    R: BlockRepository + Clone + Send + Sync + 'static,
{
    let state = AuditAppState { service };

    Router::new()
        .route("/record", post(handlers::record_operation::<R>))
        .route("/verify", post(handlers::verify_integrity::<R>))
        .route("/stats", get(handlers::chain_stats::<R>))
        .route("/seal", post(handlers::force_seal::<R>))
        .route("/validate", get(handlers::validate_chain::<R>))
        .with_state(state)
}
