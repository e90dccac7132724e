//! Transaction manager.

use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::graph::{EdgeKind, SerializationGraph};
use crate::site::{SiteManager, SiteSnapshot, SiteTransition, Unavailable, VersionLookup};
use crate::stats::EngineStats;
use crate::topology::Topology;
use crate::transaction::outcome::{
    AbortReason, CommitOutcome, FailReport, ReadOutcome, ReadSource, WriteOutcome,
};
use crate::transaction::state::{ReadRecord, Transaction, TransactionKind};
use crate::types::{SiteId, Timestamp, TransactionId, Value, VariableId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Coordinates transactions over the replicated sites.
///
/// The transaction manager provides:
/// - Snapshot reads served from the first available replica
/// - Buffered writes applied to every replica at commit
/// - First-committer-wins for concurrent writes to the same variable
/// - SSI validation through the serialization graph
/// - Eager aborts when a site a transaction intends to write to fails
///
/// Every operation takes `&mut self` and runs to completion; the caller
/// supplies the logical tick.
#[derive(Debug)]
pub struct TransactionManager {
    topology: Topology,
    sites: SiteManager,
    graph: SerializationGraph,
    /// All transactions ever begun, by ID.
    txns: BTreeMap<TransactionId, Transaction>,
    /// Most recent transaction for each label.
    labels: HashMap<String, TransactionId>,
    next_txid: u64,
    /// Last commit tick handed out.
    last_commit: Timestamp,
    stats: EngineStats,
}

impl TransactionManager {
    /// Creates a transaction manager with freshly seeded sites.
    pub fn new(config: &EngineConfig) -> CoreResult<Self> {
        let topology = Topology::new(config)?;
        let sites = SiteManager::new(&topology);
        Ok(Self {
            topology,
            sites,
            graph: SerializationGraph::new(),
            txns: BTreeMap::new(),
            labels: HashMap::new(),
            next_txid: 1,
            last_commit: Timestamp::ZERO,
            stats: EngineStats::new(),
        })
    }

    /// Begins a read-write transaction whose snapshot is `now`.
    pub fn begin(&mut self, label: &str, now: Timestamp) -> CoreResult<TransactionId> {
        self.begin_with_kind(label, TransactionKind::ReadWrite, now)
    }

    /// Begins a read-only transaction whose snapshot is `now`.
    pub fn begin_read_only(&mut self, label: &str, now: Timestamp) -> CoreResult<TransactionId> {
        self.begin_with_kind(label, TransactionKind::ReadOnly, now)
    }

    fn begin_with_kind(
        &mut self,
        label: &str,
        kind: TransactionKind,
        now: Timestamp,
    ) -> CoreResult<TransactionId> {
        if let Some(existing) = self.labels.get(label) {
            if self.txns.get(existing).is_some_and(Transaction::is_active) {
                return Err(CoreError::DuplicateTransaction {
                    label: label.to_string(),
                });
            }
        }

        let id = TransactionId::new(self.next_txid);
        self.next_txid += 1;
        self.txns.insert(id, Transaction::new(id, label, kind, now));
        self.labels.insert(label.to_string(), id);
        self.stats.record_transaction_start();

        debug!(txn = label, start = now.as_u64(), ?kind, "begin");
        Ok(id)
    }

    /// Looks up the most recent transaction with this label.
    pub fn resolve(&self, label: &str) -> CoreResult<TransactionId> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| CoreError::unknown_transaction(label))
    }

    /// Gets a transaction by ID.
    #[must_use]
    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.txns.get(&id)
    }

    /// Iterates over every transaction in ID order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.txns.values()
    }

    /// Returns the number of active transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.txns.values().filter(|t| t.is_active()).count()
    }

    /// Reads a variable within a transaction's snapshot.
    ///
    /// Buffered writes and earlier reads are answered from the transaction
    /// itself. Otherwise the hosting sites are tried in ascending order and
    /// the first one holding a readable version as of the snapshot serves the
    /// read. If none can, the read is deferred and must be re-issued.
    pub fn read(&mut self, id: TransactionId, variable: VariableId) -> CoreResult<ReadOutcome> {
        let variable = self.topology.check_variable(variable)?;
        let txn = self.txn(id)?;
        if let Some(reason) = txn.abort_reason() {
            return Ok(ReadOutcome::Aborted(reason));
        }
        txn.ensure_active()?;

        if let Some(value) = txn.pending_write(variable) {
            return Ok(ReadOutcome::Value {
                value,
                source: ReadSource::OwnWrite,
            });
        }
        if let Some(record) = txn.recorded_read(variable) {
            return Ok(ReadOutcome::Value {
                value: record.value,
                source: ReadSource::ReadSet,
            });
        }

        let snapshot = txn.start();
        let mut cause = Unavailable::NotHosted;
        for site in self.topology.sites_for(variable) {
            match self.sites.get(site)?.current_version(variable, snapshot) {
                VersionLookup::Found(version) => {
                    self.txn_mut(id)?.record_read(
                        variable,
                        ReadRecord {
                            value: version.value,
                            observed: version.committed_at,
                            writer: version.writer,
                        },
                    );
                    self.stats.record_read();
                    return Ok(ReadOutcome::Value {
                        value: version.value,
                        source: ReadSource::Site(site),
                    });
                }
                VersionLookup::NotAvailable(reason) => cause = reason,
            }
        }

        self.stats.record_deferred_read();
        debug!(txn = %id, %variable, ?cause, "read deferred");
        Ok(ReadOutcome::Deferred { cause })
    }

    /// Buffers a write. Nothing reaches a site before commit.
    pub fn write(
        &mut self,
        id: TransactionId,
        variable: VariableId,
        value: Value,
    ) -> CoreResult<WriteOutcome> {
        let variable = self.topology.check_variable(variable)?;
        let target_sites = self.topology.sites_for(variable).len();
        let txn = self.txn_mut(id)?;
        if let Some(reason) = txn.abort_reason() {
            return Ok(WriteOutcome::Aborted(reason));
        }
        txn.put(variable, value)?;
        self.stats.record_write();
        Ok(WriteOutcome::Buffered { target_sites })
    }

    /// Attempts to commit a transaction at tick `now`.
    ///
    /// Read-write transactions go through, in order: the availability check,
    /// first-committer-wins, conflict-edge construction and SSI validation.
    /// Read-only transactions only contribute their edges and always commit.
    /// A transaction that was already aborted reports the reason it was aborted with.
    pub fn commit(&mut self, id: TransactionId, now: Timestamp) -> CoreResult<CommitOutcome> {
        let txn = self.txn(id)?;
        if let Some(reason) = txn.abort_reason() {
            return Ok(CommitOutcome::Aborted(reason));
        }
        txn.ensure_active()?;
        if now <= self.last_commit || now <= txn.start() {
            return Err(CoreError::ClockRegression {
                last: self.last_commit.max(txn.start()),
                attempted: now,
            });
        }

        let read_only = txn.is_read_only();
        let writes: Vec<(VariableId, Value)> = txn.pending_writes().collect();

        if !read_only {
            let unavailable = writes
                .iter()
                .any(|(var, _)| !self.sites.all_up(&self.topology.sites_for(*var)));
            if unavailable {
                return self.abort_with(id, AbortReason::SiteUnavailableAtCommit, now);
            }
            if self.has_write_conflict(id) {
                return self.abort_with(id, AbortReason::WriteWriteConflict, now);
            }
        }

        self.record_conflicts(id, now);

        if !read_only && self.violates_ssi(id, now) {
            return self.abort_with(id, AbortReason::SerializationCycle, now);
        }

        let mut applied = 0u64;
        for (var, value) in &writes {
            for site in self.topology.sites_for(*var) {
                self.sites
                    .get_mut(site)?
                    .apply_commit(*var, *value, now, id)?;
                applied += 1;
            }
        }

        let txn = self.txn_mut(id)?;
        txn.mark_committed(now);
        info!("{} committed at tick {}", txn.label(), now);
        self.last_commit = now;
        self.stats.record_versions_applied(applied);
        self.stats.record_transaction_commit();
        Ok(CommitOutcome::Committed { at: now })
    }

    /// Aborts an active transaction.
    pub fn abort(&mut self, id: TransactionId, reason: AbortReason) -> CoreResult<()> {
        self.txn(id)?.ensure_active()?;
        self.abort_inner(id, reason)
    }

    /// Aborts every active transaction with a pending write to a variable
    /// hosted at `site`.
    ///
    /// Returns the aborted transactions in ID order.
    pub fn on_site_failure(
        &mut self,
        site: SiteId,
        now: Timestamp,
    ) -> CoreResult<Vec<TransactionId>> {
        let victims: Vec<TransactionId> = self
            .txns
            .values()
            .filter(|t| t.is_active())
            .filter(|t| {
                t.pending_writes()
                    .any(|(var, _)| self.topology.is_hosted_at(var, site))
            })
            .map(Transaction::id)
            .collect();

        for id in &victims {
            self.abort_inner(*id, AbortReason::SiteFailedMidTransaction)?;
        }
        if !victims.is_empty() {
            debug!(%site, tick = now.as_u64(), count = victims.len(), "aborted writers of failed site");
        }
        Ok(victims)
    }

    /// Fails a site and aborts the transactions that intended to write to it.
    pub fn fail_site(&mut self, site: SiteId, now: Timestamp) -> CoreResult<FailReport> {
        let transition = self.sites.fail(site, now)?;
        if !transition.is_changed() {
            warn!("{} is already down", site);
            return Ok(FailReport {
                transition,
                aborted: Vec::new(),
            });
        }

        info!("{} failed at tick {}", site, now);
        self.stats.record_site_failure();
        let aborted = self.on_site_failure(site, now)?;
        Ok(FailReport {
            transition,
            aborted,
        })
    }

    /// Recovers a site.
    pub fn recover_site(&mut self, site: SiteId, now: Timestamp) -> CoreResult<SiteTransition> {
        let transition = self.sites.recover(site, now)?;
        if transition.is_changed() {
            info!("{} recovered at tick {}", site, now);
            self.stats.record_site_recovery();
        } else {
            warn!("{} is already up", site);
        }
        Ok(transition)
    }

    /// Reports the readable state of every site.
    #[must_use]
    pub fn dump(&self) -> Vec<SiteSnapshot> {
        self.sites.snapshot_all()
    }

    /// Reports the readable state of one site.
    pub fn dump_site(&self, site: SiteId) -> CoreResult<SiteSnapshot> {
        self.sites.snapshot(site)
    }

    /// Reports the newest readable value of a variable at each hosting site.
    pub fn dump_variable(&self, variable: VariableId) -> CoreResult<Vec<(SiteId, Option<Value>)>> {
        let variable = self.topology.check_variable(variable)?;
        self.topology
            .sites_for(variable)
            .into_iter()
            .map(|site| {
                let store = self.sites.get(site)?;
                Ok((site, store.latest_readable(variable).map(|v| v.value)))
            })
            .collect()
    }

    /// Returns the topology.
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Returns the sites.
    #[must_use]
    pub fn sites(&self) -> &SiteManager {
        &self.sites
    }

    /// Returns the serialization graph.
    #[must_use]
    pub fn graph(&self) -> &SerializationGraph {
        &self.graph
    }

    /// Returns the engine statistics.
    #[must_use]
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Returns the tick of the most recent commit.
    #[must_use]
    pub fn last_commit(&self) -> Timestamp {
        self.last_commit
    }

    fn txn(&self, id: TransactionId) -> CoreResult<&Transaction> {
        self.txns
            .get(&id)
            .ok_or(CoreError::TransactionNotFound { id })
    }

    fn txn_mut(&mut self, id: TransactionId) -> CoreResult<&mut Transaction> {
        self.txns
            .get_mut(&id)
            .ok_or(CoreError::TransactionNotFound { id })
    }

    fn abort_with(
        &mut self,
        id: TransactionId,
        reason: AbortReason,
        now: Timestamp,
    ) -> CoreResult<CommitOutcome> {
        debug!(txn = %id, tick = now.as_u64(), %reason, "commit rejected");
        self.abort_inner(id, reason)?;
        Ok(CommitOutcome::Aborted(reason))
    }

    fn abort_inner(&mut self, id: TransactionId, reason: AbortReason) -> CoreResult<()> {
        let txn = self.txn_mut(id)?;
        txn.mark_aborted(reason);
        info!("{} aborted: {}", txn.label(), reason);
        self.graph.purge(id);
        self.stats.record_transaction_abort(reason);
        Ok(())
    }

    /// True if a transaction that committed after `id` started wrote one of
    /// the variables `id` is about to write.
    fn has_write_conflict(&self, id: TransactionId) -> bool {
        let Some(txn) = self.txns.get(&id) else {
            return false;
        };
        self.txns.values().any(|other| {
            other.id() != id
                && other.commit_ts().is_some_and(|c| c > txn.start())
                && txn.pending_writes().any(|(var, _)| other.writes_to(var))
        })
    }

    /// Adds the edges between `id` and every live transaction whose lifetime
    /// overlaps it, plus write-read edges from the writers of versions `id`
    /// read.
    fn record_conflicts(&mut self, id: TransactionId, now: Timestamp) {
        let Some(txn) = self.txns.get(&id) else {
            return;
        };
        let mut edges = Vec::new();

        for (_, read) in txn.read_set() {
            if let Some(writer) = read.writer {
                edges.push((writer, id, EdgeKind::WriteRead));
            }
        }

        for other in self.txns.values() {
            if other.id() == id || other.is_aborted() || !txn.overlaps(other, now) {
                continue;
            }
            let other_id = other.id();

            for (var, _) in txn.pending_writes() {
                if other.writes_to(var) {
                    if other.is_committed() {
                        edges.push((other_id, id, EdgeKind::WriteWrite));
                    } else {
                        edges.push((id, other_id, EdgeKind::WriteWrite));
                    }
                }
                if other.recorded_read(var).is_some() {
                    // `id` commits now, after anything `other` could have seen.
                    edges.push((other_id, id, EdgeKind::ReadWrite));
                }
            }

            for (var, read) in txn.read_set() {
                if !other.writes_to(var) {
                    continue;
                }
                let overwritten = other.commit_ts().map_or(true, |c| c > read.observed);
                if overwritten {
                    edges.push((id, other_id, EdgeKind::ReadWrite));
                }
            }
        }

        for (from, to, kind) in edges {
            self.graph.record_edge(from, to, kind, now);
        }
    }

    /// True if committing `id` would leave a committed or committing pivot.
    ///
    /// Checks `id` itself and every already-committed neighbour across an
    /// anti-dependency edge, since a committed pivot can no longer abort.
    fn violates_ssi(&self, id: TransactionId, now: Timestamp) -> bool {
        if self.is_pivot(id, id, now) {
            return true;
        }
        let neighbours: BTreeSet<TransactionId> = self
            .graph
            .rw_in(id)
            .chain(self.graph.rw_out(id))
            .collect();
        neighbours.into_iter().any(|n| {
            self.txns.get(&n).is_some_and(Transaction::is_committed) && self.is_pivot(n, id, now)
        })
    }

    fn is_pivot(&self, pivot: TransactionId, committing: TransactionId, now: Timestamp) -> bool {
        let Some(p) = self.txns.get(&pivot) else {
            return false;
        };
        // A live read-only neighbour will commit no matter what, so it
        // counts as committed.
        self.graph.has_dangerous_structure(pivot, |n| {
            self.txns.get(&n).is_some_and(|u| {
                let settled = u.is_committed()
                    || n == committing
                    || (u.is_active() && u.is_read_only());
                settled && u.overlaps(p, now)
            })
        })
    }
}
