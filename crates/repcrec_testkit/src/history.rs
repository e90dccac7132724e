//! History checker.
//!
//! Inspects a transaction manager after a run and reports every broken
//! engine invariant. Used by property tests over generated scripts.

use repcrec_core::{EdgeKind, SiteId, TransactionId, TransactionManager, VariableId};
use std::fmt;

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A version history is not strictly increasing in commit tick.
    UnorderedHistory {
        /// Site holding the history.
        site: SiteId,
        /// Variable whose history is out of order.
        variable: VariableId,
    },
    /// Two replicas of a variable hold different histories.
    DivergentReplicas {
        /// The variable.
        variable: VariableId,
        /// First site compared.
        left: SiteId,
        /// Second site compared.
        right: SiteId,
    },
    /// A committed write is missing from a hosting site.
    MissingWrite {
        /// The committed transaction.
        txn: TransactionId,
        /// The variable written.
        variable: VariableId,
        /// The site that lacks the version.
        site: SiteId,
    },
    /// A version was written by a transaction that did not commit.
    UncommittedVersion {
        /// The writer.
        txn: TransactionId,
        /// The variable.
        variable: VariableId,
    },
    /// A committed update transaction is a pivot between two committed
    /// neighbours. A read-only neighbour counts only if its anti-dependency
    /// was recorded by the time the pivot committed.
    CommittedPivot {
        /// The pivot.
        txn: TransactionId,
    },
    /// An aborted transaction still has edges in the serialization graph.
    AbortedInGraph {
        /// The aborted transaction.
        txn: TransactionId,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnorderedHistory { site, variable } => {
                write!(f, "history of {variable} at {site} is not ordered")
            }
            Self::DivergentReplicas {
                variable,
                left,
                right,
            } => write!(f, "{variable} differs between {left} and {right}"),
            Self::MissingWrite {
                txn,
                variable,
                site,
            } => write!(f, "{txn} committed {variable} but {site} lacks it"),
            Self::UncommittedVersion { txn, variable } => {
                write!(f, "{variable} has a version from uncommitted {txn}")
            }
            Self::CommittedPivot { txn } => write!(f, "{txn} committed as a pivot"),
            Self::AbortedInGraph { txn } => write!(f, "aborted {txn} still has edges"),
        }
    }
}

/// Checks every invariant and returns the violations found.
pub fn check_history(tm: &TransactionManager) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_histories(tm, &mut violations);
    check_replicas(tm, &mut violations);
    check_transactions(tm, &mut violations);
    violations
}

/// Panics with a readable list if any invariant is broken.
pub fn assert_history_ok(tm: &TransactionManager) {
    let violations = check_history(tm);
    if !violations.is_empty() {
        let list: Vec<String> = violations.iter().map(ToString::to_string).collect();
        panic!("history violations:\n  {}", list.join("\n  "));
    }
}

fn check_histories(tm: &TransactionManager, out: &mut Vec<Violation>) {
    for store in tm.sites().iter() {
        for variable in store.variables() {
            let Some(history) = store.history(variable) else {
                continue;
            };
            let ordered = history
                .windows(2)
                .all(|w| w[0].committed_at < w[1].committed_at);
            if !ordered {
                out.push(Violation::UnorderedHistory {
                    site: store.id(),
                    variable,
                });
            }
            for version in history {
                let committed = version
                    .writer
                    .map_or(true, |w| tm.transaction(w).is_some_and(|t| t.is_committed()));
                if let (false, Some(txn)) = (committed, version.writer) {
                    out.push(Violation::UncommittedVersion { txn, variable });
                }
            }
        }
    }
}

fn check_replicas(tm: &TransactionManager, out: &mut Vec<Violation>) {
    let topology = tm.topology();
    for variable in topology.variables() {
        let sites = topology.sites_for(variable);
        let Some((first, rest)) = sites.split_first() else {
            continue;
        };
        let Ok(reference) = tm.sites().get(*first) else {
            continue;
        };
        for site in rest {
            let Ok(store) = tm.sites().get(*site) else {
                continue;
            };
            if store.history(variable) != reference.history(variable) {
                out.push(Violation::DivergentReplicas {
                    variable,
                    left: *first,
                    right: *site,
                });
            }
        }
    }
}

fn check_transactions(tm: &TransactionManager, out: &mut Vec<Violation>) {
    let now = tm.last_commit();
    for txn in tm.transactions() {
        if txn.is_aborted() && tm.graph().touches(txn.id()) {
            out.push(Violation::AbortedInGraph { txn: txn.id() });
        }
        let Some(at) = txn.commit_ts() else {
            continue;
        };

        for (variable, _) in txn.pending_writes() {
            for site in tm.topology().sites_for(variable) {
                let present = tm
                    .sites()
                    .get(site)
                    .ok()
                    .and_then(|store| store.history(variable))
                    .is_some_and(|h| {
                        h.iter()
                            .any(|v| v.committed_at == at && v.writer == Some(txn.id()))
                    });
                if !present {
                    out.push(Violation::MissingWrite {
                        txn: txn.id(),
                        variable,
                        site,
                    });
                }
            }
        }

        // A read-only reader only counts if its edge was there when the
        // pivot committed; a later reader cannot be aborted.
        let graph = tm.graph();
        let pivot = graph.has_dangerous_structure(txn.id(), |n| {
            tm.transaction(n).is_some_and(|u| {
                let seen = !u.is_read_only()
                    || graph
                        .recorded_at(n, txn.id(), EdgeKind::ReadWrite)
                        .is_some_and(|t| t <= at);
                u.is_committed() && seen && u.overlaps(txn, now)
            })
        });
        if pivot && !txn.is_read_only() {
            out.push(Violation::CommittedPivot { txn: txn.id() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestEngine;

    #[test]
    fn clean_run_has_no_violations() {
        let mut engine = TestEngine::new();
        engine.begin_txn("T1");
        engine.write_var("T1", 2, 5);
        engine.end_txn("T1");
        engine.begin_txn("T2");
        engine.write_var("T2", 3, 7);
        engine.fail_site_at(4);
        engine.end_txn("T2");
        assert_history_ok(&engine);
    }

    #[test]
    fn write_skew_leaves_no_committed_pivot() {
        let mut engine = TestEngine::new();
        engine.begin_txn("T1");
        engine.begin_txn("T2");
        engine.read_var("T1", 2);
        engine.read_var("T2", 4);
        engine.write_var("T1", 4, 1);
        engine.write_var("T2", 2, 2);
        engine.end_txn("T1");
        engine.end_txn("T2");
        assert!(check_history(&engine).is_empty());
    }

    #[test]
    fn live_read_only_reader_blocks_pivot() {
        let mut engine = TestEngine::new();
        engine.begin_txn("P");
        engine.begin_txn("W");
        engine.read_var("P", 4);
        engine.write_var("W", 4, 1);
        engine.end_txn("W");
        engine.begin_read_only_txn("R");
        assert_eq!(engine.read_value("R", 2), 20);
        assert_eq!(engine.read_value("R", 4), 1);
        engine.write_var("P", 2, 2);
        assert!(!engine.end_txn("P").is_committed());
        assert!(engine.end_txn("R").is_committed());
        assert_history_ok(&engine);
    }

    #[test]
    fn late_read_only_reader_is_not_a_pivot_neighbour() {
        let mut engine = TestEngine::new();
        engine.begin_txn("P");
        engine.begin_txn("W");
        engine.read_var("P", 4);
        engine.write_var("W", 4, 1);
        engine.end_txn("W");
        engine.begin_read_only_txn("R");
        engine.write_var("P", 2, 2);
        assert!(engine.end_txn("P").is_committed());
        assert_eq!(engine.read_value("R", 4), 1);
        assert_eq!(engine.read_value("R", 2), 20);
        assert!(engine.end_txn("R").is_committed());

        let (p, r) = (engine.id("P"), engine.id("R"));
        assert!(engine
            .graph()
            .recorded_at(r, p, EdgeKind::ReadWrite)
            .is_some_and(|t| Some(t) > engine.transaction(p).and_then(|u| u.commit_ts())));
        assert!(check_history(&engine).is_empty());
    }

    #[test]
    fn violations_render() {
        let v = Violation::CommittedPivot {
            txn: TransactionId::new(3),
        };
        assert_eq!(v.to_string(), "txn:3 committed as a pivot");
    }
}
