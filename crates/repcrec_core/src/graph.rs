//! Serialization graph for SSI validation.
//!
//! Nodes are transaction identities; edges carry a dependency kind. Only
//! read-write anti-dependencies take part in the dangerous-structure test,
//! the other kinds are kept for auditing.

use crate::types::{Timestamp, TransactionId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// Both transactions wrote the same variable; `from` committed first.
    WriteWrite,
    /// `to` read a version written by `from`.
    WriteRead,
    /// Anti-dependency: `from` read a version that `to` overwrote.
    ReadWrite,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WriteWrite => "ww",
            Self::WriteRead => "wr",
            Self::ReadWrite => "rw",
        };
        f.write_str(s)
    }
}

/// A directed dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    /// Source transaction.
    pub from: TransactionId,
    /// Target transaction.
    pub to: TransactionId,
    /// Dependency kind.
    pub kind: EdgeKind,
}

/// Directed multigraph over transactions.
#[derive(Debug, Default)]
pub struct SerializationGraph {
    outgoing: BTreeMap<TransactionId, BTreeSet<(TransactionId, EdgeKind)>>,
    incoming: BTreeMap<TransactionId, BTreeSet<(TransactionId, EdgeKind)>>,
    /// Tick at which each edge was first recorded.
    recorded: BTreeMap<(TransactionId, TransactionId, EdgeKind), Timestamp>,
}

impl SerializationGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an edge. Returns false if it already existed or is a self-edge.
    pub fn add_edge(&mut self, from: TransactionId, to: TransactionId, kind: EdgeKind) -> bool {
        if from == to {
            return false;
        }
        let inserted = self.outgoing.entry(from).or_default().insert((to, kind));
        self.incoming.entry(to).or_default().insert((from, kind));
        inserted
    }

    /// Inserts an edge and remembers the tick it first appeared at.
    pub fn record_edge(
        &mut self,
        from: TransactionId,
        to: TransactionId,
        kind: EdgeKind,
        at: Timestamp,
    ) -> bool {
        let inserted = self.add_edge(from, to, kind);
        if inserted {
            self.recorded.entry((from, to, kind)).or_insert(at);
        }
        inserted
    }

    /// Returns the tick at which an edge was recorded, if it was recorded
    /// through [`record_edge`](Self::record_edge).
    #[must_use]
    pub fn recorded_at(
        &self,
        from: TransactionId,
        to: TransactionId,
        kind: EdgeKind,
    ) -> Option<Timestamp> {
        self.recorded.get(&(from, to, kind)).copied()
    }

    /// Returns true if the exact edge exists.
    #[must_use]
    pub fn contains(&self, from: TransactionId, to: TransactionId, kind: EdgeKind) -> bool {
        self.outgoing
            .get(&from)
            .is_some_and(|set| set.contains(&(to, kind)))
    }

    /// Sources of incoming anti-dependency edges of `txn`.
    pub fn rw_in(&self, txn: TransactionId) -> impl Iterator<Item = TransactionId> + '_ {
        Self::rw_neighbours(self.incoming.get(&txn))
    }

    /// Targets of outgoing anti-dependency edges of `txn`.
    pub fn rw_out(&self, txn: TransactionId) -> impl Iterator<Item = TransactionId> + '_ {
        Self::rw_neighbours(self.outgoing.get(&txn))
    }

    /// Checks the pivot condition for `pivot`.
    ///
    /// True iff `pivot` has an incoming and an outgoing anti-dependency edge
    /// whose other endpoints satisfy `eligible`. The caller decides
    /// eligibility (committed or committing, and concurrent with the pivot).
    /// This never misses a cycle made of anti-dependency edges but can flag
    /// histories that are in fact serializable.
    pub fn has_dangerous_structure<F>(&self, pivot: TransactionId, mut eligible: F) -> bool
    where
        F: FnMut(TransactionId) -> bool,
    {
        self.rw_in(pivot).any(&mut eligible) && self.rw_out(pivot).any(&mut eligible)
    }

    /// Removes every edge touching `txn`.
    pub fn purge(&mut self, txn: TransactionId) {
        if let Some(targets) = self.outgoing.remove(&txn) {
            for (to, kind) in targets {
                if let Some(set) = self.incoming.get_mut(&to) {
                    set.remove(&(txn, kind));
                }
            }
        }
        if let Some(sources) = self.incoming.remove(&txn) {
            for (from, kind) in sources {
                if let Some(set) = self.outgoing.get_mut(&from) {
                    set.remove(&(txn, kind));
                }
            }
        }
        self.recorded.retain(|(from, to, _), _| *from != txn && *to != txn);
    }

    /// Returns true if any edge touches `txn`.
    #[must_use]
    pub fn touches(&self, txn: TransactionId) -> bool {
        self.outgoing.get(&txn).is_some_and(|s| !s.is_empty())
            || self.incoming.get(&txn).is_some_and(|s| !s.is_empty())
    }

    /// Iterates over all edges in a deterministic order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.outgoing.iter().flat_map(|(from, targets)| {
            targets.iter().map(move |(to, kind)| Edge {
                from: *from,
                to: *to,
                kind: *kind,
            })
        })
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    fn rw_neighbours(
        set: Option<&BTreeSet<(TransactionId, EdgeKind)>>,
    ) -> impl Iterator<Item = TransactionId> + '_ {
        set.into_iter()
            .flatten()
            .filter(|(_, kind)| *kind == EdgeKind::ReadWrite)
            .map(|(txn, _)| *txn)
    }
}
