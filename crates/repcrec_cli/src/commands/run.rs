//! Run command implementation.

use crate::commands::config::{resolve, FileConfig, Overrides};
use repcrec_core::{StatsSnapshot, Timestamp};
use repcrec_script::{Driver, Event, ScriptReader};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;

/// How outcome events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One line per event, written as the run progresses.
    Text,
    /// A single [`RunReport`] written when the run ends.
    Json,
}

impl OutputFormat {
    /// Parses a `--format` value.
    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format: {other} (expected text or json)")),
        }
    }
}

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Script path; `None` reads standard input.
    pub script: Option<PathBuf>,
    /// Output path; `None` writes to standard output.
    pub output: Option<PathBuf>,
    /// Configuration file.
    pub config: Option<PathBuf>,
    /// `--sites`
    pub sites: Option<u32>,
    /// `--variables`
    pub variables: Option<u32>,
    /// `--retry-limit`
    pub retry_limit: Option<u32>,
    /// Output format.
    pub format: OutputFormat,
}

/// One event in a JSON report.
#[derive(Debug, Serialize)]
pub struct EventRecord {
    /// Tick at which the event was produced.
    pub tick: u64,
    /// Event kind.
    pub kind: &'static str,
    /// Transaction label, if the event concerns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// Rendered event line.
    pub text: String,
}

/// Engine statistics in a JSON report.
#[derive(Debug, Serialize)]
pub struct StatsRecord {
    /// Transactions begun.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions aborted.
    pub transactions_aborted: u64,
    /// Aborts by reason.
    pub aborts: BTreeMap<&'static str, u64>,
    /// Reads that returned a value.
    pub reads_served: u64,
    /// Reads that were deferred.
    pub reads_deferred: u64,
    /// Writes buffered.
    pub writes_buffered: u64,
    /// Versions applied across all sites.
    pub versions_applied: u64,
    /// Site failures.
    pub site_failures: u64,
    /// Site recoveries.
    pub site_recoveries: u64,
}

impl From<StatsSnapshot> for StatsRecord {
    fn from(stats: StatsSnapshot) -> Self {
        Self {
            transactions_started: stats.transactions_started,
            transactions_committed: stats.transactions_committed,
            transactions_aborted: stats.transactions_aborted,
            aborts: stats
                .aborts_by_reason
                .iter()
                .filter(|(_, count)| *count > 0)
                .map(|(reason, count)| (reason.as_str(), *count))
                .collect(),
            reads_served: stats.reads_served,
            reads_deferred: stats.reads_deferred,
            writes_buffered: stats.writes_buffered,
            versions_applied: stats.versions_applied,
            site_failures: stats.site_failures,
            site_recoveries: stats.site_recoveries,
        }
    }
}

/// Result of a run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Number of sites.
    pub sites: u32,
    /// Number of variables.
    pub variables: u32,
    /// Final logical tick.
    pub ticks: u64,
    /// Every event in order.
    pub events: Vec<EventRecord>,
    /// Engine statistics at the end of the run.
    pub stats: StatsRecord,
}

/// Runs the run command.
pub fn run(options: &RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let file = match &options.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let flags = Overrides {
        sites: options.sites,
        variables: options.variables,
        retry_limit: options.retry_limit,
    };
    let (engine, driver_config) = resolve(&file, flags);
    let mut driver = Driver::new(&engine, driver_config)?;

    let mut out: Box<dyn Write> = match &options.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match &options.script {
        Some(path) => execute(
            ScriptReader::open(path)?,
            &mut driver,
            &mut out,
            options.format,
        )?,
        None => execute(
            ScriptReader::new(io::stdin().lock()),
            &mut driver,
            &mut out,
            options.format,
        )?,
    };
    out.flush()?;
    Ok(())
}

/// Drives a script to completion and writes its events.
///
/// Text output is streamed; JSON output is written once at the end.
pub fn execute<R: BufRead, W: Write + ?Sized>(
    reader: ScriptReader<R>,
    driver: &mut Driver,
    out: &mut W,
    format: OutputFormat,
) -> Result<RunReport, Box<dyn std::error::Error>> {
    let mut records = Vec::new();
    let mut emit = |tick: Timestamp, event: Event, out: &mut W| -> io::Result<()> {
        if format == OutputFormat::Text {
            writeln!(out, "{event}")?;
        }
        records.push(EventRecord {
            tick: tick.as_u64(),
            kind: event.kind(),
            transaction: event.transaction().map(str::to_string),
            text: event.to_string(),
        });
        Ok(())
    };

    for line in reader {
        match line {
            Ok(line) => {
                for instruction in &line.instructions {
                    let events = driver.execute(instruction);
                    let tick = driver.clock().now();
                    for event in events {
                        emit(tick, event, &mut *out)?;
                    }
                }
            }
            Err(e) if e.is_syntax() => {
                tracing::warn!("{}", e);
                let event = Event::Rejected {
                    instruction: String::from("<line>"),
                    reason: e.to_string(),
                };
                emit(driver.clock().now(), event, &mut *out)?;
            }
            Err(e) => return Err(e.into()),
        }
    }
    let tick = driver.clock().now();
    for event in driver.finish() {
        emit(tick, event, &mut *out)?;
    }

    let topology = driver.manager().topology();
    let report = RunReport {
        sites: topology.num_sites(),
        variables: topology.num_variables(),
        ticks: tick.as_u64(),
        events: records,
        stats: driver.manager().stats().snapshot().into(),
    };
    if format == OutputFormat::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    }
    Ok(report)
}
