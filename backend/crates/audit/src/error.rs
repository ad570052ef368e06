//! Audit Error Types
//!
//! This module provides audit-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Audit-specific result type alias
pub type AuditResult<T> = Result<T, AuditError>;

/// Audit-specific error variants
///
/// These map to appropriate HTTP status codes and convert to `AppError`
/// for unified error handling. A verification mismatch is NOT an error:
/// it is a normal outcome reported through the verification response.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Malformed operation record, rejected before entering the queue
    #[error("Invalid operation record: {0}")]
    Validation(String),

    /// An append would violate the sequence or linkage invariants
    #[error("Chain integrity violation: {0}")]
    ChainIntegrity(String),

    /// Nonce search exceeded the configured attempt cap
    #[error("Sealing gave up after {attempts} attempts")]
    SealTimeout { attempts: u64 },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Record batch (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuditError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuditError::Validation(_) => StatusCode::BAD_REQUEST,
            AuditError::ChainIntegrity(_) => StatusCode::CONFLICT,
            AuditError::SealTimeout { .. }
            | AuditError::Database(_)
            | AuditError::Serialization(_)
            | AuditError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::Validation(_) => ErrorKind::BadRequest,
            AuditError::ChainIntegrity(_) => ErrorKind::Conflict,
            AuditError::SealTimeout { .. }
            | AuditError::Database(_)
            | AuditError::Serialization(_)
            | AuditError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuditError::Database(e) => {
                tracing::error!(error = %e, "audit database error");
            }
            AuditError::ChainIntegrity(msg) => {
                tracing::error!(message = %msg, "chain integrity violation");
            }
            AuditError::Serialization(e) => {
                tracing::error!(error = %e, "audit serialization error");
            }
            AuditError::Internal(msg) => {
                tracing::error!(message = %msg, "audit internal error");
            }
            AuditError::SealTimeout { attempts } => {
                tracing::warn!(attempts = attempts, "seal attempt cap reached");
            }
            AuditError::Validation(_) => {
                tracing::debug!(error = %self, "rejected operation record");
            }
        }
    }
}

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        AppError::new(kind, message)
    }
}

impl IntoResponse for AuditError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        // Return empty body for security (don't leak details)
        (status, ()).into_response()
    }
}
