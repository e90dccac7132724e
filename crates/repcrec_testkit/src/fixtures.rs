//! Test fixtures and engine helpers.
//!
//! Provides a transaction manager paired with its own clock, and helpers for
//! running scripts end to end.

use repcrec_core::{
    CommitOutcome, EngineConfig, FailReport, ReadOutcome, SiteId, SiteTransition, Timestamp,
    TransactionId, TransactionManager, Value, VariableId, WriteOutcome,
};
use repcrec_script::{Clock, Driver, DriverConfig, Event, ScriptReader};
use std::io::Write;
use std::path::Path;

/// A transaction manager that advances its own clock on every call.
///
/// Transactions are addressed by label and sites and variables by number,
/// so tests read like scripts.
pub struct TestEngine {
    /// The engine under test.
    pub tm: TransactionManager,
    clock: Clock,
}

impl TestEngine {
    /// Creates an engine with the default topology.
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Creates an engine with `sites` sites and `variables` variables.
    pub fn with_sites(sites: u32, variables: u32) -> Self {
        Self::with_config(&EngineConfig::new().num_sites(sites).num_variables(variables))
    }

    /// Creates an engine from a configuration.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            tm: TransactionManager::new(config).expect("Failed to create engine"),
            clock: Clock::new(),
        }
    }

    /// Returns the current tick.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Advances the clock.
    pub fn tick(&mut self) -> Timestamp {
        self.clock.tick()
    }

    /// Looks up a transaction by label.
    pub fn id(&self, label: &str) -> TransactionId {
        self.tm.resolve(label).expect("Unknown transaction label")
    }

    /// `begin(label)`
    pub fn begin_txn(&mut self, label: &str) -> TransactionId {
        let now = self.tick();
        self.tm.begin(label, now).expect("Failed to begin")
    }

    /// `beginRO(label)`
    pub fn begin_read_only_txn(&mut self, label: &str) -> TransactionId {
        let now = self.tick();
        self.tm.begin_read_only(label, now).expect("Failed to begin")
    }

    /// `R(label, x<var>)`
    pub fn read_var(&mut self, label: &str, var: u32) -> ReadOutcome {
        self.tick();
        let id = self.id(label);
        self.tm
            .read(id, VariableId::new(var))
            .expect("Read rejected")
    }

    /// `R(label, x<var>)`, expecting a value.
    pub fn read_value(&mut self, label: &str, var: u32) -> Value {
        match self.read_var(label, var) {
            ReadOutcome::Value { value, .. } => value,
            other => panic!("R({label}, x{var}) did not return a value: {other:?}"),
        }
    }

    /// `W(label, x<var>, value)`
    pub fn write_var(&mut self, label: &str, var: u32, value: Value) -> WriteOutcome {
        self.tick();
        let id = self.id(label);
        self.tm
            .write(id, VariableId::new(var), value)
            .expect("Write rejected")
    }

    /// `end(label)`
    pub fn end_txn(&mut self, label: &str) -> CommitOutcome {
        let now = self.tick();
        let id = self.id(label);
        self.tm.commit(id, now).expect("Commit rejected")
    }

    /// `fail(site)`
    pub fn fail_site_at(&mut self, site: u32) -> FailReport {
        let now = self.tick();
        self.tm
            .fail_site(SiteId::new(site), now)
            .expect("Fail rejected")
    }

    /// `recover(site)`
    pub fn recover_site_at(&mut self, site: u32) -> SiteTransition {
        let now = self.tick();
        self.tm
            .recover_site(SiteId::new(site), now)
            .expect("Recover rejected")
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = TransactionManager;

    fn deref(&self) -> &Self::Target {
        &self.tm
    }
}

impl std::ops::DerefMut for TestEngine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tm
    }
}

/// Runs a script with default settings and returns its output lines.
pub fn run_script(script: &str) -> Vec<String> {
    run_script_with(script, &EngineConfig::default(), DriverConfig::default())
}

/// Runs a script with the given settings and returns its output lines.
pub fn run_script_with(script: &str, engine: &EngineConfig, config: DriverConfig) -> Vec<String> {
    run_events(script, engine, config)
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Runs a script and returns its events.
pub fn run_events(script: &str, engine: &EngineConfig, config: DriverConfig) -> Vec<Event> {
    let mut driver = Driver::new(engine, config).expect("Failed to create driver");
    driver
        .run(ScriptReader::from_text(script))
        .expect("Script run failed")
}

/// Runs a script and hands back the driver for inspection.
pub fn run_driver(script: &str, engine: &EngineConfig, config: DriverConfig) -> Driver {
    let mut driver = Driver::new(engine, config).expect("Failed to create driver");
    driver
        .run(ScriptReader::from_text(script))
        .expect("Script run failed");
    driver
}

/// Runs a test with the script written to a temporary file.
pub fn with_script_file<F, R>(script: &str, f: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(script.as_bytes())
        .expect("Failed to write script");
    f(file.path())
}

/// Canonical scenario scripts.
pub mod scenarios {
    /// Two sites, two variables: a commit refused while site 2 is down, and
    /// a read served by site 2 once it recovers. T2 started before T1
    /// committed, so it reads the seed value of x1 rather than T1's 11.
    ///
    /// Run with `EngineConfig::new().num_sites(2).num_variables(2)`.
    pub const TWO_SITE: &str = "\
// two sites
begin(T1)
W(T1, x1, 11)
begin(T2)
R(T2, x2)
end(T1)
fail(2)
begin(T3)
W(T3, x1, 99)
end(T3)
recover(2)
R(T2, x1)
end(T2)
";

    /// Classic write skew; the second committer must abort.
    pub const WRITE_SKEW: &str = "\
begin(T1)
begin(T2)
R(T1, x2)
R(T2, x4)
W(T1, x4, 1)
W(T2, x2, 2)
end(T1)
end(T2)
";

    /// Two concurrent writers of the same variable.
    pub const FIRST_COMMITTER_WINS: &str = "\
begin(T1); begin(T2)
W(T1, x8, 101)
W(T2, x8, 202)
end(T1)
end(T2)
dump(x8)
";

    /// A read deferred until the only copy comes back.
    pub const DEFERRED_READ: &str = "\
fail(4)
begin(T1)
R(T1, x3)
W(T1, x6, 66)
recover(4)
end(T1)
dump(4)
";

    /// A writer aborted because a site it wrote to failed.
    pub const EAGER_ABORT: &str = "\
begin(T1)
begin(T2)
W(T1, x3, 33)
W(T2, x5, 55)
fail(4)
end(T1)
end(T2)
dump(x3); dump(x5)
";

    /// A read-only transaction reads its snapshot across a later commit.
    pub const READ_ONLY_SNAPSHOT: &str = "\
beginRO(T1)
begin(T2)
W(T2, x2, 22)
end(T2)
R(T1, x2)
end(T1)
";
}
