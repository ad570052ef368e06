//! Presentation Layer
//!
//! HTTP handlers and DTOs for the audit API.

pub mod dto;
pub mod handlers;
pub mod router;
