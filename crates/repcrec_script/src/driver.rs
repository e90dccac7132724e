//! Script driver.
//!
//! The driver owns the logical clock and the transaction manager. Every
//! executed instruction advances the clock by one tick. Reads that no site
//! can serve are parked in a FIFO queue and retried after each later
//! instruction; later reads, writes and ends of the same transaction queue
//! up behind them so per-transaction order is preserved.

use crate::error::ScriptResult;
use crate::event::Event;
use crate::instruction::{DumpTarget, Instruction};
use crate::reader::ScriptReader;
use repcrec_core::{
    AbortReason, CommitOutcome, CoreError, CoreResult, EngineConfig, ReadOutcome, SiteTransition,
    Timestamp, TransactionManager, WriteOutcome,
};
use std::collections::{HashSet, VecDeque};
use std::io::BufRead;
use tracing::{debug, warn};

/// Logical clock. Starts at zero; the first tick is 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    now: Timestamp,
}

impl Clock {
    /// Creates a clock at tick zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current tick.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Advances the clock and returns the new tick.
    pub fn tick(&mut self) -> Timestamp {
        self.now = self.now.next();
        self.now
    }
}

/// Driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverConfig {
    /// How many times a deferred read is retried before its transaction is
    /// aborted with [`AbortReason::ReadUnavailable`]. `None` waits forever.
    pub retry_limit: Option<u32>,
}

impl DriverConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry limit.
    #[must_use]
    pub const fn retry_limit(mut self, limit: Option<u32>) -> Self {
        self.retry_limit = limit;
        self
    }
}

#[derive(Debug)]
struct Pending {
    instruction: Instruction,
    txn: String,
    /// Retries so far; zero for instructions queued behind another.
    attempts: u32,
}

/// Result of executing one instruction against the engine.
enum Step {
    Done(Vec<Event>),
    Deferred(Vec<Event>),
}

/// Runs instructions against a [`TransactionManager`].
#[derive(Debug)]
pub struct Driver {
    tm: TransactionManager,
    clock: Clock,
    config: DriverConfig,
    pending: VecDeque<Pending>,
}

impl Driver {
    /// Creates a driver over a freshly seeded engine.
    pub fn new(engine: &EngineConfig, config: DriverConfig) -> ScriptResult<Self> {
        Ok(Self {
            tm: TransactionManager::new(engine)?,
            clock: Clock::new(),
            config,
            pending: VecDeque::new(),
        })
    }

    /// Returns the transaction manager.
    #[must_use]
    pub fn manager(&self) -> &TransactionManager {
        &self.tm
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Returns the driver configuration.
    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Returns the number of queued instructions.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Executes one instruction, then retries queued instructions.
    ///
    /// Never fails: instructions the engine refuses produce
    /// [`Event::Rejected`].
    pub fn execute(&mut self, instruction: &Instruction) -> Vec<Event> {
        let now = self.clock.tick();
        debug!(tick = now.as_u64(), %instruction, "execute");

        let mut events = Vec::new();
        let mut deferred = false;
        match self.blocked_label(instruction) {
            Some(txn) => {
                events.push(Event::Waiting {
                    txn: txn.clone(),
                    instruction: instruction.to_string(),
                });
                self.pending.push_back(Pending {
                    instruction: instruction.clone(),
                    txn,
                    attempts: 0,
                });
            }
            None => match self.apply(instruction, now) {
                Ok(Step::Done(done)) => events.extend(done),
                Ok(Step::Deferred(first)) => {
                    events.extend(first);
                    deferred = true;
                }
                Err(e) => events.push(rejected(instruction, &e)),
            },
        }

        // Older entries first; a fresh deferral is not retried on its own tick.
        events.extend(self.retry_pending());
        if deferred {
            self.defer(instruction, now, &mut events);
        }
        events
    }

    /// Executes every line of a script and then reports unfinished
    /// transactions.
    ///
    /// Lines with syntax errors produce [`Event::Rejected`]; I/O errors stop
    /// the run.
    pub fn run<R: BufRead>(&mut self, reader: ScriptReader<R>) -> ScriptResult<Vec<Event>> {
        let mut events = Vec::new();
        for line in reader {
            match line {
                Ok(line) => {
                    for instruction in &line.instructions {
                        events.extend(self.execute(instruction));
                    }
                }
                Err(e) if e.is_syntax() => {
                    warn!("{}", e);
                    events.push(Event::Rejected {
                        instruction: String::from("<line>"),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        events.extend(self.finish());
        Ok(events)
    }

    /// Reports every transaction still active, in begin order.
    pub fn finish(&mut self) -> Vec<Event> {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "instructions still queued");
        }
        self.tm
            .transactions()
            .filter(|t| t.is_active())
            .map(|t| Event::Unfinished {
                txn: t.label().to_string(),
            })
            .collect()
    }

    /// Returns the label if an earlier instruction of the same transaction
    /// is still queued.
    fn blocked_label(&self, instruction: &Instruction) -> Option<String> {
        if !instruction.is_queueable() {
            return None;
        }
        let txn = instruction.transaction()?;
        self.pending
            .iter()
            .any(|p| p.txn == txn)
            .then(|| txn.to_string())
    }

    fn defer(&mut self, instruction: &Instruction, now: Timestamp, events: &mut Vec<Event>) {
        let Some(txn) = instruction.transaction() else {
            return;
        };
        if self.config.retry_limit == Some(0) {
            events.extend(self.give_up(txn, now));
            return;
        }
        self.pending.push_back(Pending {
            instruction: instruction.clone(),
            txn: txn.to_string(),
            attempts: 0,
        });
    }

    /// Retries the queue once in FIFO order. An entry still deferred blocks
    /// the later entries of its transaction for this pass.
    fn retry_pending(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        let mut blocked: HashSet<String> = HashSet::new();
        let queue = std::mem::take(&mut self.pending);

        for mut entry in queue {
            if blocked.contains(&entry.txn) {
                self.pending.push_back(entry);
                continue;
            }
            let now = match entry.instruction {
                // A commit needs its own tick.
                Instruction::End { .. } => self.clock.tick(),
                _ => self.clock.now(),
            };
            match self.apply(&entry.instruction, now) {
                Ok(Step::Done(done)) => events.extend(done),
                // Deferral is reported once, when first queued.
                Ok(Step::Deferred(_)) => {
                    entry.attempts += 1;
                    let exhausted = self
                        .config
                        .retry_limit
                        .is_some_and(|limit| entry.attempts >= limit);
                    if exhausted {
                        let txn = entry.txn.clone();
                        events.extend(self.give_up(&txn, now));
                    } else {
                        blocked.insert(entry.txn.clone());
                        self.pending.push_back(entry);
                    }
                }
                Err(e) => events.push(rejected(&entry.instruction, &e)),
            }
        }
        events
    }

    fn give_up(&mut self, txn: &str, now: Timestamp) -> Vec<Event> {
        let result = self
            .tm
            .resolve(txn)
            .and_then(|id| self.tm.abort(id, AbortReason::ReadUnavailable));
        match result {
            Ok(()) => {
                debug!(txn, tick = now.as_u64(), "retry limit reached");
                vec![Event::Aborted {
                    txn: txn.to_string(),
                    reason: AbortReason::ReadUnavailable,
                }]
            }
            Err(e) => {
                warn!("cannot abort {}: {}", txn, e);
                Vec::new()
            }
        }
    }

    fn apply(&mut self, instruction: &Instruction, now: Timestamp) -> CoreResult<Step> {
        let events = match instruction {
            Instruction::Begin { txn } => {
                self.tm.begin(txn, now)?;
                vec![Event::Began {
                    txn: txn.clone(),
                    read_only: false,
                    at: now,
                }]
            }
            Instruction::BeginReadOnly { txn } => {
                self.tm.begin_read_only(txn, now)?;
                vec![Event::Began {
                    txn: txn.clone(),
                    read_only: true,
                    at: now,
                }]
            }
            Instruction::Read { txn, variable } => {
                let id = self.tm.resolve(txn)?;
                match self.tm.read(id, *variable)? {
                    ReadOutcome::Value { value, source } => vec![Event::ReadValue {
                        txn: txn.clone(),
                        variable: *variable,
                        value,
                        source,
                    }],
                    ReadOutcome::Deferred { cause } => {
                        return Ok(Step::Deferred(vec![Event::ReadDeferred {
                            txn: txn.clone(),
                            variable: *variable,
                            cause,
                        }]))
                    }
                    ReadOutcome::Aborted(reason) => vec![skipped(instruction, txn, reason)],
                }
            }
            Instruction::Write {
                txn,
                variable,
                value,
            } => {
                let id = self.tm.resolve(txn)?;
                match self.tm.write(id, *variable, *value)? {
                    WriteOutcome::Buffered { target_sites } => vec![Event::WriteBuffered {
                        txn: txn.clone(),
                        variable: *variable,
                        value: *value,
                        target_sites,
                    }],
                    WriteOutcome::Aborted(reason) => vec![skipped(instruction, txn, reason)],
                }
            }
            Instruction::End { txn } => {
                let id = self.tm.resolve(txn)?;
                match self.tm.commit(id, now)? {
                    CommitOutcome::Committed { at } => vec![Event::Committed {
                        txn: txn.clone(),
                        at,
                    }],
                    CommitOutcome::Aborted(reason) => vec![Event::Aborted {
                        txn: txn.clone(),
                        reason,
                    }],
                }
            }
            Instruction::Fail { site } => {
                let site = self.tm.topology().check_site(*site)?;
                let report = self.tm.fail_site(site, now)?;
                if report.transition == SiteTransition::AlreadyDown {
                    vec![Event::SiteAlreadyDown { site }]
                } else {
                    let mut events = vec![Event::SiteFailed { site }];
                    for id in report.aborted {
                        if let Some(txn) = self.tm.transaction(id) {
                            events.push(Event::Aborted {
                                txn: txn.label().to_string(),
                                reason: AbortReason::SiteFailedMidTransaction,
                            });
                        }
                    }
                    events
                }
            }
            Instruction::Recover { site } => {
                let site = self.tm.topology().check_site(*site)?;
                match self.tm.recover_site(site, now)? {
                    SiteTransition::AlreadyUp => vec![Event::SiteAlreadyUp { site }],
                    _ => vec![Event::SiteRecovered { site }],
                }
            }
            Instruction::Dump(DumpTarget::All) => {
                self.tm.dump().into_iter().map(Event::DumpSite).collect()
            }
            Instruction::Dump(DumpTarget::Site(site)) => {
                let site = self.tm.topology().check_site(*site)?;
                vec![Event::DumpSite(self.tm.dump_site(site)?)]
            }
            Instruction::Dump(DumpTarget::Variable(variable)) => vec![Event::DumpVariable {
                variable: *variable,
                copies: self.tm.dump_variable(*variable)?,
            }],
        };
        Ok(Step::Done(events))
    }
}

fn skipped(instruction: &Instruction, txn: &str, reason: AbortReason) -> Event {
    Event::Skipped {
        txn: txn.to_string(),
        instruction: instruction.to_string(),
        reason,
    }
}

fn rejected(instruction: &Instruction, error: &CoreError) -> Event {
    if error.is_input_error() {
        debug!(%instruction, %error, "rejected");
    } else {
        warn!("{} rejected: {}", instruction, error);
    }
    Event::Rejected {
        instruction: instruction.to_string(),
        reason: error.to_string(),
    }
}

/// Runs a script held in memory with default settings.
pub fn run_script(text: &str) -> ScriptResult<Vec<Event>> {
    let mut driver = Driver::new(&EngineConfig::default(), DriverConfig::default())?;
    driver.run(ScriptReader::from_text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use repcrec_core::{ReadSource, SiteId, Unavailable, VariableId};

    fn driver() -> Driver {
        Driver::new(&EngineConfig::default(), DriverConfig::default()).unwrap()
    }

    fn exec(driver: &mut Driver, text: &str) -> Vec<Event> {
        let instruction: Instruction = text.parse().unwrap();
        driver.execute(&instruction)
    }

    fn lines(events: &[Event]) -> Vec<String> {
        events.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn clock_advances_per_instruction() {
        let mut clock = Clock::new();
        assert_eq!(clock.now(), Timestamp::ZERO);
        assert_eq!(clock.tick(), Timestamp::new(1));
        assert_eq!(clock.tick(), Timestamp::new(2));
        assert_eq!(clock.now(), Timestamp::new(2));
    }

    #[test]
    fn begin_read_write_end() {
        let mut d = driver();
        assert_eq!(lines(&exec(&mut d, "begin(T1)")), vec!["T1 begins at 1"]);
        assert_eq!(
            lines(&exec(&mut d, "R(T1, x2)")),
            vec!["T1 reads x2: 20 (site 1)"]
        );
        assert_eq!(
            lines(&exec(&mut d, "W(T1, x2, 5)")),
            vec!["T1 writes x2: 5 (to 10 sites)"]
        );
        assert_eq!(lines(&exec(&mut d, "end(T1)")), vec!["T1 commits at 4"]);
    }

    #[test]
    fn unknown_transaction_is_rejected() {
        let mut d = driver();
        let events = exec(&mut d, "R(T9, x1)");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "rejected");
        assert_eq!(d.clock().now(), Timestamp::new(1));
    }

    #[test]
    fn unknown_site_is_rejected() {
        let mut d = driver();
        assert_eq!(exec(&mut d, "fail(11)")[0].kind(), "rejected");
        assert_eq!(exec(&mut d, "dump(0)")[0].kind(), "rejected");
    }

    #[test]
    fn deferred_read_retried_after_recovery() {
        let mut d = driver();
        exec(&mut d, "fail(4)");
        exec(&mut d, "begin(T1)");
        let events = exec(&mut d, "R(T1, x3)");
        assert_eq!(
            events,
            vec![Event::ReadDeferred {
                txn: "T1".into(),
                variable: VariableId::new(3),
                cause: Unavailable::SiteDown,
            }]
        );
        assert_eq!(d.pending_len(), 1);

        let held = exec(&mut d, "W(T1, x4, 9)");
        assert_eq!(held[0].kind(), "waiting");
        assert_eq!(d.pending_len(), 2);

        let events = exec(&mut d, "recover(4)");
        assert_eq!(
            events,
            vec![
                Event::SiteRecovered {
                    site: SiteId::new(4)
                },
                Event::ReadValue {
                    txn: "T1".into(),
                    variable: VariableId::new(3),
                    value: 30,
                    source: ReadSource::Site(SiteId::new(4)),
                },
                Event::WriteBuffered {
                    txn: "T1".into(),
                    variable: VariableId::new(4),
                    value: 9,
                    target_sites: 10,
                },
            ]
        );
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn queued_end_gets_its_own_tick() {
        let mut d = driver();
        exec(&mut d, "fail(4)");
        exec(&mut d, "begin(T1)");
        exec(&mut d, "R(T1, x3)");
        exec(&mut d, "end(T1)");
        let events = exec(&mut d, "recover(4)");
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            Event::Committed {
                txn: "T1".into(),
                at: Timestamp::new(6)
            }
        );
        assert_eq!(d.clock().now(), Timestamp::new(6));
    }

    #[test]
    fn retry_limit_aborts_reader() {
        let config = DriverConfig::new().retry_limit(Some(2));
        let mut d = Driver::new(&EngineConfig::default(), config).unwrap();
        exec(&mut d, "fail(4)");
        exec(&mut d, "begin(T1)");
        exec(&mut d, "R(T1, x3)");
        assert!(exec(&mut d, "dump(1)").iter().all(|e| e.kind() == "dump_site"));
        let events = exec(&mut d, "dump(1)");
        assert_eq!(
            events.last(),
            Some(&Event::Aborted {
                txn: "T1".into(),
                reason: AbortReason::ReadUnavailable
            })
        );
        assert_eq!(d.pending_len(), 0);
        assert_eq!(
            lines(&exec(&mut d, "end(T1)")),
            vec!["T1 aborts: read unavailable"]
        );
    }

    #[test]
    fn zero_retry_limit_aborts_immediately() {
        let config = DriverConfig::new().retry_limit(Some(0));
        let mut d = Driver::new(&EngineConfig::default(), config).unwrap();
        exec(&mut d, "fail(4)");
        exec(&mut d, "begin(T1)");
        let events = exec(&mut d, "R(T1, x3)");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind(), "aborted");
        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn site_failure_reports_victims() {
        let mut d = driver();
        exec(&mut d, "begin(T1)");
        exec(&mut d, "W(T1, x3, 1)");
        assert_eq!(
            lines(&exec(&mut d, "fail(4)")),
            vec!["site 4 fails", "T1 aborts: site failed mid-transaction"]
        );
        assert_eq!(
            lines(&exec(&mut d, "fail(4)")),
            vec!["site 4 is already down"]
        );
        assert_eq!(exec(&mut d, "R(T1, x2)")[0].kind(), "skipped");
    }

    #[test]
    fn dump_variants() {
        let mut d = driver();
        assert_eq!(exec(&mut d, "dump()").len(), 10);
        assert_eq!(
            lines(&exec(&mut d, "dump(x3)")),
            vec!["x3 - site 4: 30"]
        );
        exec(&mut d, "fail(2)");
        assert_eq!(lines(&exec(&mut d, "dump(2)")), vec!["site 2 - down"]);
    }

    #[test]
    fn run_reports_unfinished_and_bad_lines() {
        let events = run_script("begin(T1)\nbogus(\nbegin(T2); end(T2)\n").unwrap();
        let kinds: Vec<&str> = events.iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec!["began", "rejected", "began", "committed", "unfinished"]
        );
        assert_eq!(events[4].transaction(), Some("T1"));
    }
}
