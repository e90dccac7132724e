//! Per-site data managers.
//!
//! Each site keeps an append-only version history for every variable it
//! hosts, its up/down status and a readable flag per variable. Histories
//! reference transactions by [`TransactionId`](crate::TransactionId) only.

mod manager;
mod store;
mod version;

pub use manager::{SiteManager, SiteSnapshot};
pub use store::{DownInterval, SiteStatus, SiteStore, SiteTransition, Unavailable, VersionLookup};
pub use version::Version;
