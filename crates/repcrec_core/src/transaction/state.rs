//! Transaction state.

use crate::error::{CoreError, CoreResult};
use crate::transaction::outcome::AbortReason;
use crate::types::{Timestamp, TransactionId, Value, VariableId};
use std::collections::BTreeMap;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// Whether a transaction may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Buffers writes and is validated at commit.
    ReadWrite,
    /// Reads a fixed snapshot and always commits.
    ReadOnly,
}

/// A read recorded in a transaction's read set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRecord {
    /// Value returned to the transaction.
    pub value: Value,
    /// Commit timestamp of the version that was read.
    pub observed: Timestamp,
    /// Transaction that wrote that version; `None` for seed versions.
    pub writer: Option<TransactionId>,
}

/// A transaction.
///
/// Writes are buffered here and stay invisible to every site until commit.
#[derive(Debug)]
pub struct Transaction {
    /// Transaction ID.
    id: TransactionId,
    /// Script label, e.g. `T1`.
    label: String,
    /// Read-write or read-only.
    kind: TransactionKind,
    /// Snapshot tick (reads see this point in time).
    start: Timestamp,
    /// Current state.
    state: TransactionState,
    /// Commit tick, set on successful commit.
    commit_ts: Option<Timestamp>,
    /// Abort reason, set on abort.
    abort_reason: Option<AbortReason>,
    /// Pending writes: variable -> value.
    writes: BTreeMap<VariableId, Value>,
    /// Read set: variable -> observed version.
    reads: BTreeMap<VariableId, ReadRecord>,
}

impl Transaction {
    /// Creates a new transaction.
    pub(crate) fn new(
        id: TransactionId,
        label: impl Into<String>,
        kind: TransactionKind,
        start: Timestamp,
    ) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            start,
            state: TransactionState::Active,
            commit_ts: None,
            abort_reason: None,
            writes: BTreeMap::new(),
            reads: BTreeMap::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the script label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the transaction kind.
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Checks if this is a read-only transaction.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.kind == TransactionKind::ReadOnly
    }

    /// Returns the snapshot tick.
    #[must_use]
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Checks if the transaction committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    /// Checks if the transaction aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state == TransactionState::Aborted
    }

    /// Returns the commit tick.
    #[must_use]
    pub fn commit_ts(&self) -> Option<Timestamp> {
        self.commit_ts
    }

    /// Returns the abort reason.
    #[must_use]
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.abort_reason
    }

    /// Returns true if the lifetimes of `self` and `other` overlap.
    ///
    /// A transaction without a commit tick is treated as ending at `now`.
    #[must_use]
    pub fn overlaps(&self, other: &Transaction, now: Timestamp) -> bool {
        let self_end = self.commit_ts.unwrap_or(now);
        let other_end = other.commit_ts.unwrap_or(now);
        self.start < other_end && other.start < self_end
    }

    /// Records a buffered write.
    pub fn put(&mut self, variable: VariableId, value: Value) -> CoreResult<()> {
        self.ensure_active()?;
        if self.is_read_only() {
            return Err(CoreError::ReadOnlyWrite {
                label: self.label.clone(),
            });
        }
        self.writes.insert(variable, value);
        Ok(())
    }

    /// Records a read.
    ///
    /// The first read of a variable wins; later reads never revise it. Reads
    /// of variables this transaction already wrote are not recorded.
    pub fn record_read(&mut self, variable: VariableId, record: ReadRecord) {
        if !self.writes.contains_key(&variable) {
            self.reads.entry(variable).or_insert(record);
        }
    }

    /// Gets a pending write.
    #[must_use]
    pub fn pending_write(&self, variable: VariableId) -> Option<Value> {
        self.writes.get(&variable).copied()
    }

    /// Gets a recorded read.
    #[must_use]
    pub fn recorded_read(&self, variable: VariableId) -> Option<&ReadRecord> {
        self.reads.get(&variable)
    }

    /// Returns all pending writes in variable order.
    pub fn pending_writes(&self) -> impl Iterator<Item = (VariableId, Value)> + '_ {
        self.writes.iter().map(|(var, value)| (*var, *value))
    }

    /// Returns true if the write buffer holds `variable`.
    #[must_use]
    pub fn writes_to(&self, variable: VariableId) -> bool {
        self.writes.contains_key(&variable)
    }

    /// Returns the number of pending writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Returns the read set in variable order.
    pub fn read_set(&self) -> impl Iterator<Item = (VariableId, &ReadRecord)> + '_ {
        self.reads.iter().map(|(var, record)| (*var, record))
    }

    /// Marks the transaction as committed.
    pub(crate) fn mark_committed(&mut self, at: Timestamp) {
        self.state = TransactionState::Committed;
        self.commit_ts = Some(at);
    }

    /// Marks the transaction as aborted and drops its buffered state.
    pub(crate) fn mark_aborted(&mut self, reason: AbortReason) {
        self.state = TransactionState::Aborted;
        self.abort_reason = Some(reason);
        self.writes.clear();
        self.reads.clear();
    }

    /// Ensures the transaction is active.
    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(format!(
                "transaction {} already committed",
                self.label
            ))),
            TransactionState::Aborted => Err(CoreError::invalid_operation(format!(
                "transaction {} already aborted",
                self.label
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_txn() -> Transaction {
        Transaction::new(
            TransactionId::new(1),
            "T1",
            TransactionKind::ReadWrite,
            Timestamp::new(1),
        )
    }

    fn record(value: Value, observed: u64) -> ReadRecord {
        ReadRecord {
            value,
            observed: Timestamp::new(observed),
            writer: None,
        }
    }

    #[test]
    fn new_transaction_is_active() {
        let txn = create_txn();
        assert!(txn.is_active());
        assert_eq!(txn.state(), TransactionState::Active);
        assert_eq!(txn.label(), "T1");
    }

    #[test]
    fn put_records_write() {
        let mut txn = create_txn();
        txn.put(VariableId::new(2), 7).unwrap();

        assert_eq!(txn.write_count(), 1);
        assert_eq!(txn.pending_write(VariableId::new(2)), Some(7));
    }

    #[test]
    fn put_overwrites_previous() {
        let mut txn = create_txn();
        txn.put(VariableId::new(2), 1).unwrap();
        txn.put(VariableId::new(2), 2).unwrap();

        assert_eq!(txn.write_count(), 1);
        assert_eq!(txn.pending_write(VariableId::new(2)), Some(2));
    }

    #[test]
    fn read_only_rejects_writes() {
        let mut txn = Transaction::new(
            TransactionId::new(2),
            "T2",
            TransactionKind::ReadOnly,
            Timestamp::new(1),
        );
        let err = txn.put(VariableId::new(2), 1).unwrap_err();
        assert!(matches!(err, CoreError::ReadOnlyWrite { .. }));
    }

    #[test]
    fn cannot_write_after_commit() {
        let mut txn = create_txn();
        txn.mark_committed(Timestamp::new(3));

        assert!(txn.put(VariableId::new(2), 1).is_err());
        assert_eq!(txn.commit_ts(), Some(Timestamp::new(3)));
    }

    #[test]
    fn abort_discards_buffers() {
        let mut txn = create_txn();
        txn.put(VariableId::new(2), 1).unwrap();
        txn.record_read(VariableId::new(4), record(40, 0));
        txn.mark_aborted(AbortReason::SerializationCycle);

        assert!(txn.is_aborted());
        assert_eq!(txn.write_count(), 0);
        assert_eq!(txn.read_set().count(), 0);
        assert_eq!(txn.abort_reason(), Some(AbortReason::SerializationCycle));
        assert!(txn.put(VariableId::new(2), 1).is_err());
    }

    #[test]
    fn first_read_wins() {
        let mut txn = create_txn();
        txn.record_read(VariableId::new(4), record(40, 0));
        txn.record_read(VariableId::new(4), record(41, 2));

        assert_eq!(txn.recorded_read(VariableId::new(4)).unwrap().value, 40);
    }

    #[test]
    fn read_not_recorded_if_written() {
        let mut txn = create_txn();
        txn.put(VariableId::new(4), 1).unwrap();
        txn.record_read(VariableId::new(4), record(40, 0));

        assert!(txn.read_set().next().is_none());
    }

    #[test]
    fn overlap_uses_commit_ticks() {
        let mut a = create_txn();
        let mut b = Transaction::new(
            TransactionId::new(2),
            "T2",
            TransactionKind::ReadWrite,
            Timestamp::new(4),
        );
        assert!(a.overlaps(&b, Timestamp::new(6)));

        a.mark_committed(Timestamp::new(3));
        assert!(!a.overlaps(&b, Timestamp::new(6)));

        b.mark_committed(Timestamp::new(5));
        assert!(!b.overlaps(&a, Timestamp::new(6)));
    }
}
