//! Domain Value Objects
//!
//! Immutable value types for the audit domain.

use serde::{Deserialize, Serialize};

/// Sentinel hash: 64 zero characters.
///
/// Used as the `previous_hash` of the genesis block and as the merkle root
/// of an empty record batch.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Kind of business mutation an operation record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Proof-of-work difficulty: required count of leading `'0'` hex characters
/// in a sealed block's hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difficulty(u8);

impl Difficulty {
    pub const DEFAULT: Difficulty = Difficulty(3);
    pub const MIN: u8 = 1;
    // Each hex character above this makes sealing 16x slower; anything past
    // 16 is unreachable on commodity hardware.
    pub const MAX: u8 = 16;

    pub fn new(zeros: u8) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&zeros) {
            Some(Self(zeros))
        } else {
            None
        }
    }

    pub fn zeros(&self) -> u8 {
        self.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> Self {
        d.0
    }
}
