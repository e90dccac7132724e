//! Error types for RepCRec core.
//!
//! Aborts are not errors: they are reported through the outcome types in
//! [`crate::transaction`]. A `CoreError` means the caller broke a contract
//! (unknown identifiers, operations on finished transactions, writes to a
//! down site) or supplied an invalid configuration.

use crate::types::{SiteId, Timestamp, TransactionId, VariableId};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in RepCRec core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Configuration cannot produce a valid topology.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// Site identifier outside the configured range.
    #[error("unknown site {site}")]
    UnknownSite {
        /// The requested site number.
        site: u32,
    },

    /// Variable identifier outside the configured range.
    #[error("unknown variable {variable}")]
    UnknownVariable {
        /// The requested variable.
        variable: VariableId,
    },

    /// The site does not store the variable.
    #[error("{variable} is not hosted at {site}")]
    VariableNotHosted {
        /// The site addressed.
        site: SiteId,
        /// The variable requested.
        variable: VariableId,
    },

    /// No transaction is registered under this label.
    #[error("unknown transaction {label}")]
    UnknownTransaction {
        /// Script label of the transaction.
        label: String,
    },

    /// No transaction is registered under this identifier.
    #[error("transaction {id} not found")]
    TransactionNotFound {
        /// Transaction identifier.
        id: TransactionId,
    },

    /// A live transaction already uses this label.
    #[error("transaction {label} is already active")]
    DuplicateTransaction {
        /// Script label of the transaction.
        label: String,
    },

    /// A read-only transaction attempted a write.
    #[error("read-only transaction {label} cannot write")]
    ReadOnlyWrite {
        /// Script label of the transaction.
        label: String,
    },

    /// A committed write was applied to a down site.
    #[error("{site} is down")]
    SiteDown {
        /// The down site.
        site: SiteId,
    },

    /// A version would not extend the history in timestamp order.
    #[error("timestamp regression for {variable} at {site}: last {last}, attempted {attempted}")]
    TimestampRegression {
        /// The site whose history was addressed.
        site: SiteId,
        /// The variable whose history was addressed.
        variable: VariableId,
        /// Timestamp of the newest existing version.
        last: Timestamp,
        /// Rejected timestamp.
        attempted: Timestamp,
    },

    /// Commit timestamps must strictly increase across the engine.
    #[error("clock regression: last commit at {last}, attempted {attempted}")]
    ClockRegression {
        /// Last commit timestamp handed out.
        last: Timestamp,
        /// Rejected timestamp.
        attempted: Timestamp,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an unknown transaction error.
    pub fn unknown_transaction(label: impl Into<String>) -> Self {
        Self::UnknownTransaction {
            label: label.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by script input rather than an
    /// engine contract violation.
    ///
    /// The driver reports these as rejected instructions and keeps going.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSite { .. }
                | Self::UnknownVariable { .. }
                | Self::UnknownTransaction { .. }
                | Self::DuplicateTransaction { .. }
                | Self::ReadOnlyWrite { .. }
                | Self::InvalidOperation { .. }
        )
    }
}
