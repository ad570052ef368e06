//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure: the audit
//! service owning the chain and pending queue, its configuration, and the
//! timer-driven background sealer.

pub mod config;
pub mod sealer;
pub mod service;
