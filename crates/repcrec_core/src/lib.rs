//! # RepCRec Core
//!
//! Replicated concurrency control and recovery engine.
//!
//! This crate provides:
//! - Multi-version sites with fail/recover and per-variable readability
//! - Available-copies replication over a fixed topology
//! - Snapshot isolation upgraded to serializable by graph validation
//! - Statistics and dumps for reporting
//!
//! The engine is deterministic and single-threaded. Callers own the logical
//! clock and pass the current tick to every time-dependent operation.
//!
//! ```rust,ignore
//! use repcrec_core::{EngineConfig, Timestamp, TransactionManager, VariableId};
//!
//! let mut tm = TransactionManager::new(&EngineConfig::default())?;
//! let t1 = tm.begin("T1", Timestamp::new(1))?;
//! tm.write(t1, VariableId::new(2), 5)?;
//! assert!(tm.commit(t1, Timestamp::new(2))?.is_committed());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod graph;
mod site;
mod stats;
mod topology;
mod transaction;
mod types;

pub use config::{EngineConfig, DEFAULT_NUM_SITES, DEFAULT_NUM_VARIABLES};
pub use error::{CoreError, CoreResult};
pub use graph::{Edge, EdgeKind, SerializationGraph};
pub use site::{
    DownInterval, SiteManager, SiteSnapshot, SiteStatus, SiteStore, SiteTransition, Unavailable,
    Version, VersionLookup,
};
pub use stats::{EngineStats, StatsSnapshot};
pub use topology::Topology;
pub use transaction::{
    AbortReason, CommitOutcome, FailReport, ReadOutcome, ReadRecord, ReadSource, Transaction,
    TransactionKind, TransactionManager, TransactionState, WriteOutcome,
};
pub use types::{SiteId, Timestamp, TransactionId, Value, VariableId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
