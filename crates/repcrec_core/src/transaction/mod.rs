//! Transaction management with serializable snapshot isolation.
//!
//! Transactions provide:
//! - **Snapshots**: every read sees the committed state as of begin
//! - **Buffered writes**: nothing reaches a site before commit
//! - **Available copies**: writes go to every hosting site, reads to any one
//! - **Serializability**: commits that would leave a dangerous structure abort

mod manager;
mod outcome;
mod state;

pub use manager::TransactionManager;
pub use outcome::{AbortReason, CommitOutcome, FailReport, ReadOutcome, ReadSource, WriteOutcome};
pub use state::{ReadRecord, Transaction, TransactionKind, TransactionState};
