//! End-to-end scenarios checked against the history invariants.

use repcrec_core::{AbortReason, EngineConfig, ReadOutcome, ReadSource, SiteId, Unavailable};
use repcrec_script::DriverConfig;
use repcrec_testkit::prelude::*;

const COMMITTED_PIVOT: &str = "\
begin(T1); begin(T2); begin(T3)
R(T2, x2)
W(T3, x2, 5)
R(T1, x4)
W(T2, x4, 6)
end(T3)
end(T2)
end(T1)
";

#[test]
fn canonical_scenarios_keep_invariants() {
    let default = EngineConfig::default();
    let cases = [
        (scenarios::WRITE_SKEW, default.clone()),
        (scenarios::FIRST_COMMITTER_WINS, default.clone()),
        (scenarios::DEFERRED_READ, default.clone()),
        (scenarios::EAGER_ABORT, default.clone()),
        (scenarios::READ_ONLY_SNAPSHOT, default),
        (
            scenarios::TWO_SITE,
            EngineConfig::new().num_sites(2).num_variables(2),
        ),
    ];
    for (script, engine) in cases {
        let driver = run_driver(script, &engine, DriverConfig::default());
        assert_history_ok(driver.manager());
        assert_eq!(driver.pending_len(), 0);
    }
}

#[test]
fn first_committer_wins_stats() {
    let driver = run_driver(
        scenarios::FIRST_COMMITTER_WINS,
        &EngineConfig::default(),
        DriverConfig::default(),
    );
    let stats = driver.manager().stats();
    assert_eq!(stats.transactions_started(), 2);
    assert_eq!(stats.transactions_committed(), 1);
    assert_eq!(stats.aborts_for(AbortReason::WriteWriteConflict), 1);
}

#[test]
fn reader_of_committed_pivot_aborts() {
    let lines = run_script(COMMITTED_PIVOT);
    assert_eq!(
        &lines[lines.len() - 3..],
        [
            "T3 commits at 8",
            "T2 commits at 9",
            "T1 aborts: serialization cycle",
        ]
    );
}

#[test]
fn live_read_only_reader_aborts_the_pivot() {
    let script = COMMITTED_PIVOT.replacen("begin(T1)", "beginRO(T1)", 1);
    let driver = run_driver(&script, &EngineConfig::default(), DriverConfig::default());
    let tm = driver.manager();
    let t1 = tm.resolve("T1").unwrap();
    let t2 = tm.resolve("T2").unwrap();
    assert!(tm.transaction(t1).unwrap().is_committed());
    assert!(tm.transaction(t2).unwrap().is_aborted());
    assert_history_ok(tm);
}

#[test]
fn two_site_reads_follow_the_snapshot() {
    let script = format!("{}begin(T4)\nR(T4, x1)\nend(T4)\n", scenarios::TWO_SITE);
    let config = EngineConfig::new().num_sites(2).num_variables(2);
    let lines = run_script_with(&script, &config, DriverConfig::default());
    assert!(lines.contains(&"T1 writes x1: 11 (to 1 site)".to_string()));
    assert!(lines.contains(&"T2 reads x1: 10 (site 2)".to_string()));
    assert_eq!(
        &lines[lines.len() - 3..],
        [
            "T4 begins at 13",
            "T4 reads x1: 11 (site 2)",
            "T4 commits at 15",
        ]
    );
}

/// An update transaction whose only rw-in neighbour is a read-only reader
/// that has not finished yet.
const READ_ONLY_ANOMALY: &str = "\
begin(P)
begin(W)
R(P, x4)
W(W, x4, 1)
end(W)
beginRO(R)
R(R, x2)
R(R, x4)
W(P, x2, 2)
end(P)
end(R)
";

#[test]
fn read_only_anomaly_aborts_writer() {
    let lines = run_script(READ_ONLY_ANOMALY);
    assert_eq!(
        lines,
        [
            "P begins at 1",
            "W begins at 2",
            "P reads x4: 40 (site 1)",
            "W writes x4: 1 (to 10 sites)",
            "W commits at 5",
            "R begins read-only at 6",
            "R reads x2: 20 (site 1)",
            "R reads x4: 1 (site 1)",
            "P writes x2: 2 (to 10 sites)",
            "P aborts: serialization cycle",
            "R commits at 11",
        ]
    );
    let driver = run_driver(
        READ_ONLY_ANOMALY,
        &EngineConfig::default(),
        DriverConfig::default(),
    );
    assert_history_ok(driver.manager());
}

#[test]
fn recovered_replica_waits_for_a_commit() {
    let mut engine = TestEngine::new();
    engine.fail_site_at(1);
    engine.recover_site_at(1);
    engine.begin_txn("T1");
    assert_eq!(
        engine.read_var("T1", 2),
        ReadOutcome::Value {
            value: 20,
            source: ReadSource::Site(SiteId::new(2)),
        }
    );

    engine.begin_txn("T2");
    engine.write_var("T2", 2, 7);
    assert!(engine.end_txn("T2").is_committed());

    engine.begin_txn("T3");
    assert_eq!(
        engine.read_var("T3", 2),
        ReadOutcome::Value {
            value: 7,
            source: ReadSource::Site(SiteId::new(1)),
        }
    );
    assert_history_ok(&engine);
}

#[test]
fn read_your_writes_and_repeated_reads() {
    let mut engine = TestEngine::new();
    engine.begin_txn("T1");
    engine.write_var("T1", 3, 5);
    assert_eq!(
        engine.read_var("T1", 3),
        ReadOutcome::Value {
            value: 5,
            source: ReadSource::OwnWrite,
        }
    );
    assert_eq!(engine.read_value("T1", 2), 20);
    assert_eq!(
        engine.read_var("T1", 2),
        ReadOutcome::Value {
            value: 20,
            source: ReadSource::ReadSet,
        }
    );
}

#[test]
fn every_replica_down_defers_read() {
    let mut engine = TestEngine::with_sites(2, 2);
    engine.fail_site_at(1);
    engine.fail_site_at(2);
    engine.begin_txn("T1");
    assert_eq!(
        engine.read_var("T1", 2),
        ReadOutcome::Deferred {
            cause: Unavailable::SiteDown,
        }
    );
}

#[test]
fn retry_limit_gives_up_on_read() {
    let lines = run_script_with(
        "fail(4)\nbegin(T1)\nR(T1, x3)\ndump(x3)\nend(T1)\n",
        &EngineConfig::default(),
        DriverConfig::new().retry_limit(Some(1)),
    );
    assert_eq!(
        lines,
        [
            "site 4 fails",
            "T1 begins at 2",
            "T1 waits to read x3: site down",
            "x3 - site 4: unavailable",
            "T1 aborts: read unavailable",
            "T1 aborts: read unavailable",
        ]
    );
}

#[test]
fn unknown_transaction_is_rejected() {
    let lines = run_script("R(T9, x1)\n");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("rejected R(T9, x1)"));
}

#[test]
fn script_from_file() {
    let lines = with_script_file(scenarios::READ_ONLY_SNAPSHOT, |path| {
        let text = std::fs::read_to_string(path).unwrap();
        run_script(&text)
    });
    assert_eq!(lines.last().map(String::as_str), Some("T1 commits at 6"));
}
