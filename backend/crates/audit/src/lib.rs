//! Hash-Chained Audit Log Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, hashing/sealing services, the chain, repository traits
//! - `application/` - The audit service, its config, the background sealer
//! - `infra/` - PostgreSQL persistence
//! - `presentation/` - HTTP handlers
//!
//! ## Consistency Model
//! - The in-memory chain is authoritative for the process lifetime; the
//!   database mirrors it for restarts and offline checks
//! - Recording an operation makes it durable in the pending queue; sealing
//!   and persistence are asynchronous from the caller's point of view
//! - At most one seal runs at a time; losing triggers are no-ops and their
//!   records stay queued

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AuditConfig;
pub use application::sealer::spawn_sealer;
pub use application::service::{AuditService, ChainStats, RecordOperationInput, SealTrigger};
pub use domain::value_objects::Difficulty;
pub use error::{AuditError, AuditResult};
pub use infra::postgres::PgAuditRepository;
pub use presentation::router::{audit_router, audit_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult, OptionExt, ResultExt},
    kind::ErrorKind,
};

#[cfg(test)]
mod tests;
