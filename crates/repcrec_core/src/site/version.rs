//! Committed versions.

use crate::types::{Timestamp, TransactionId, Value};

/// An immutable committed value in a variable's history at one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Committed value.
    pub value: Value,
    /// Commit timestamp.
    pub committed_at: Timestamp,
    /// Committing transaction; `None` for seed versions.
    pub writer: Option<TransactionId>,
}

impl Version {
    /// Creates the tick-0 version every copy starts with.
    #[must_use]
    pub const fn seed(value: Value) -> Self {
        Self {
            value,
            committed_at: Timestamp::ZERO,
            writer: None,
        }
    }

    /// Creates a version committed by a transaction.
    #[must_use]
    pub const fn committed(value: Value, committed_at: Timestamp, writer: TransactionId) -> Self {
        Self {
            value,
            committed_at,
            writer: Some(writer),
        }
    }

    /// Returns true if this is the seed version.
    #[must_use]
    pub const fn is_seed(&self) -> bool {
        self.writer.is_none()
    }
}
