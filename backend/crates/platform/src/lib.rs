//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256, hex digests, constant-time comparison)
//!
//! Domain crates build their hashing vocabulary on top of these primitives;
//! nothing in here knows about blocks, chains, or audit records.

pub mod crypto;
