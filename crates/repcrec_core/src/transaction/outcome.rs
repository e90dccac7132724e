//! Outcomes of transaction operations.

use crate::site::{SiteTransition, Unavailable};
use crate::types::{SiteId, Timestamp, TransactionId, Value};
use std::fmt;

/// Why a transaction was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AbortReason {
    /// A site the transaction must write to was down at commit.
    SiteUnavailableAtCommit,
    /// A site the transaction intended to write to failed before commit.
    SiteFailedMidTransaction,
    /// Commit would leave a dangerous structure in the serialization graph.
    SerializationCycle,
    /// A concurrent transaction committed a write to the same variable first.
    WriteWriteConflict,
    /// The driver gave up retrying a deferred read.
    ReadUnavailable,
    /// Aborted through [`TransactionManager::abort`](crate::TransactionManager::abort).
    /// Scripts have no instruction that produces it.
    UserRequested,
}

impl AbortReason {
    /// All reasons, in reporting order.
    pub const ALL: [AbortReason; 6] = [
        Self::SiteUnavailableAtCommit,
        Self::SiteFailedMidTransaction,
        Self::SerializationCycle,
        Self::WriteWriteConflict,
        Self::ReadUnavailable,
        Self::UserRequested,
    ];

    /// Returns a stable snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SiteUnavailableAtCommit => "site_unavailable_at_commit",
            Self::SiteFailedMidTransaction => "site_failed_mid_transaction",
            Self::SerializationCycle => "serialization_cycle",
            Self::WriteWriteConflict => "write_write_conflict",
            Self::ReadUnavailable => "read_unavailable",
            Self::UserRequested => "user_requested",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SiteUnavailableAtCommit => "site unavailable at commit",
            Self::SiteFailedMidTransaction => "site failed mid-transaction",
            Self::SerializationCycle => "serialization cycle",
            Self::WriteWriteConflict => "write-write conflict",
            Self::ReadUnavailable => "read unavailable",
            Self::UserRequested => "user requested",
        };
        f.write_str(s)
    }
}

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// The transaction's own write buffer.
    OwnWrite,
    /// An earlier read of the same variable by this transaction.
    ReadSet,
    /// A site's version history.
    Site(SiteId),
}

/// Outcome of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The read completed.
    Value {
        /// The value read.
        value: Value,
        /// Where it came from.
        source: ReadSource,
    },
    /// No hosting site can serve the read this tick; re-issue it later.
    Deferred {
        /// Cause reported by the last site tried.
        cause: Unavailable,
    },
    /// The transaction is aborted.
    Aborted(AbortReason),
}

impl ReadOutcome {
    /// Returns the value if the read completed.
    #[must_use]
    pub fn value(self) -> Option<Value> {
        match self {
            Self::Value { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Checks if the read was deferred.
    #[must_use]
    pub fn is_deferred(self) -> bool {
        matches!(self, Self::Deferred { .. })
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value is buffered; these sites will receive it at commit.
    Buffered {
        /// Number of sites that will receive the write.
        target_sites: usize,
    },
    /// The transaction is aborted.
    Aborted(AbortReason),
}

/// Outcome of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The transaction committed.
    Committed {
        /// Commit tick.
        at: Timestamp,
    },
    /// The transaction aborted, now or earlier.
    Aborted(AbortReason),
}

impl CommitOutcome {
    /// Checks if the commit succeeded.
    #[must_use]
    pub fn is_committed(self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// Returns the abort reason, if any.
    #[must_use]
    pub fn abort_reason(self) -> Option<AbortReason> {
        match self {
            Self::Aborted(reason) => Some(reason),
            Self::Committed { .. } => None,
        }
    }
}

/// Result of failing a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailReport {
    /// Whether the site status changed.
    pub transition: SiteTransition,
    /// Transactions aborted because of the failure, in ID order.
    pub aborted: Vec<TransactionId>,
}
