//! Engine statistics.
//!
//! Counters are updated by the transaction manager and read through
//! [`TransactionManager::stats`](crate::TransactionManager::stats).
//!
//! # Usage
//!
//! ```rust,ignore
//! let stats = tm.stats().snapshot();
//! println!("Committed: {}", stats.transactions_committed);
//! println!("Deferred reads: {}", stats.reads_deferred);
//! ```

use crate::transaction::AbortReason;
use std::collections::BTreeMap;

/// Engine statistics.
///
/// Values only grow; the engine is single-threaded so plain counters are
/// enough.
#[derive(Debug, Default)]
pub struct EngineStats {
    // Operation counters
    /// Reads that returned a value.
    reads_served: u64,
    /// Reads that had to be deferred.
    reads_deferred: u64,
    /// Writes buffered.
    writes_buffered: u64,
    /// Versions appended to site histories.
    versions_applied: u64,

    // Transaction counters
    transactions_started: u64,
    transactions_committed: u64,
    aborts: BTreeMap<AbortReason, u64>,

    // Site counters
    site_failures: u64,
    site_recoveries: u64,
}

impl EngineStats {
    /// Creates a new stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_read(&mut self) {
        self.reads_served += 1;
    }

    pub(crate) fn record_deferred_read(&mut self) {
        self.reads_deferred += 1;
    }

    pub(crate) fn record_write(&mut self) {
        self.writes_buffered += 1;
    }

    pub(crate) fn record_versions_applied(&mut self, count: u64) {
        self.versions_applied += count;
    }

    pub(crate) fn record_transaction_start(&mut self) {
        self.transactions_started += 1;
    }

    pub(crate) fn record_transaction_commit(&mut self) {
        self.transactions_committed += 1;
    }

    pub(crate) fn record_transaction_abort(&mut self, reason: AbortReason) {
        *self.aborts.entry(reason).or_insert(0) += 1;
    }

    pub(crate) fn record_site_failure(&mut self) {
        self.site_failures += 1;
    }

    pub(crate) fn record_site_recovery(&mut self) {
        self.site_recoveries += 1;
    }

    // === Getter methods (public API) ===

    /// Returns the number of reads that returned a value.
    #[must_use]
    pub fn reads_served(&self) -> u64 {
        self.reads_served
    }

    /// Returns the number of deferred reads.
    #[must_use]
    pub fn reads_deferred(&self) -> u64 {
        self.reads_deferred
    }

    /// Returns the number of transactions started.
    #[must_use]
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started
    }

    /// Returns the number of transactions committed.
    #[must_use]
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed
    }

    /// Returns the number of transactions aborted, for any reason.
    #[must_use]
    pub fn transactions_aborted(&self) -> u64 {
        self.aborts.values().sum()
    }

    /// Returns the number of aborts with the given reason.
    #[must_use]
    pub fn aborts_for(&self, reason: AbortReason) -> u64 {
        self.aborts.get(&reason).copied().unwrap_or(0)
    }

    /// Returns a snapshot of all stats.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads_served: self.reads_served,
            reads_deferred: self.reads_deferred,
            writes_buffered: self.writes_buffered,
            versions_applied: self.versions_applied,
            transactions_started: self.transactions_started,
            transactions_committed: self.transactions_committed,
            transactions_aborted: self.transactions_aborted(),
            aborts_by_reason: AbortReason::ALL
                .iter()
                .map(|r| (*r, self.aborts_for(*r)))
                .collect(),
            site_failures: self.site_failures,
            site_recoveries: self.site_recoveries,
        }
    }
}

/// A point-in-time snapshot of engine statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Reads that returned a value.
    pub reads_served: u64,
    /// Reads that were deferred.
    pub reads_deferred: u64,
    /// Writes buffered.
    pub writes_buffered: u64,
    /// Versions appended to site histories.
    pub versions_applied: u64,
    /// Transactions started.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions aborted.
    pub transactions_aborted: u64,
    /// Aborts per reason, in [`AbortReason::ALL`] order.
    pub aborts_by_reason: Vec<(AbortReason, u64)>,
    /// `fail` instructions that took a site down.
    pub site_failures: u64,
    /// `recover` instructions that brought a site back.
    pub site_recoveries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = EngineStats::new();
        assert_eq!(stats.reads_served(), 0);
        assert_eq!(stats.transactions_committed(), 0);
        assert_eq!(stats.transactions_aborted(), 0);
    }

    #[test]
    fn record_transactions() {
        let mut stats = EngineStats::new();

        stats.record_transaction_start();
        stats.record_transaction_start();
        stats.record_transaction_commit();
        stats.record_transaction_abort(AbortReason::SerializationCycle);

        assert_eq!(stats.transactions_started(), 2);
        assert_eq!(stats.transactions_committed(), 1);
        assert_eq!(stats.transactions_aborted(), 1);
        assert_eq!(stats.aborts_for(AbortReason::SerializationCycle), 1);
        assert_eq!(stats.aborts_for(AbortReason::ReadUnavailable), 0);
    }

    #[test]
    fn snapshot() {
        let mut stats = EngineStats::new();
        stats.record_read();
        stats.record_deferred_read();
        stats.record_write();
        stats.record_versions_applied(10);

        let snap = stats.snapshot();
        assert_eq!(snap.reads_served, 1);
        assert_eq!(snap.reads_deferred, 1);
        assert_eq!(snap.writes_buffered, 1);
        assert_eq!(snap.versions_applied, 10);
        assert_eq!(snap.aborts_by_reason.len(), AbortReason::ALL.len());
    }
}
