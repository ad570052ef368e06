//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (OperationRecord, Block)
//! - Domain value objects (OperationKind, Difficulty)
//! - Domain services (hashing, merkle reduction, block sealing)
//! - The append-only chain and its validation
//! - Repository traits (interfaces)

pub mod chain;
pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
