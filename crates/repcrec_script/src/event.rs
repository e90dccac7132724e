//! Outcome events reported by the driver.
//!
//! Each event renders as one output line.

use repcrec_core::{
    AbortReason, ReadSource, SiteId, SiteSnapshot, SiteStatus, Timestamp, Unavailable, Value,
    VariableId,
};
use std::fmt;

/// Something the driver reports to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A transaction began.
    Began {
        /// Transaction label.
        txn: String,
        /// True for `beginRO`.
        read_only: bool,
        /// Snapshot tick.
        at: Timestamp,
    },
    /// A read returned a value.
    ReadValue {
        /// Transaction label.
        txn: String,
        /// Variable read.
        variable: VariableId,
        /// Value returned.
        value: Value,
        /// Where it came from.
        source: ReadSource,
    },
    /// A read could not be served and was queued.
    ReadDeferred {
        /// Transaction label.
        txn: String,
        /// Variable requested.
        variable: VariableId,
        /// Why no site could serve it.
        cause: Unavailable,
    },
    /// A write was buffered.
    WriteBuffered {
        /// Transaction label.
        txn: String,
        /// Variable written.
        variable: VariableId,
        /// Value written.
        value: Value,
        /// Sites that will receive it at commit.
        target_sites: usize,
    },
    /// An instruction was held back behind a blocked one of the same
    /// transaction.
    Waiting {
        /// Transaction label.
        txn: String,
        /// The held-back instruction.
        instruction: String,
    },
    /// An operation was ignored because its transaction already aborted.
    Skipped {
        /// Transaction label.
        txn: String,
        /// The ignored instruction.
        instruction: String,
        /// Why the transaction aborted.
        reason: AbortReason,
    },
    /// A transaction committed.
    Committed {
        /// Transaction label.
        txn: String,
        /// Commit tick.
        at: Timestamp,
    },
    /// A transaction aborted.
    Aborted {
        /// Transaction label.
        txn: String,
        /// Why.
        reason: AbortReason,
    },
    /// A site went down.
    SiteFailed {
        /// The site.
        site: SiteId,
    },
    /// A site came back up.
    SiteRecovered {
        /// The site.
        site: SiteId,
    },
    /// `fail` on a site that was already down.
    SiteAlreadyDown {
        /// The site.
        site: SiteId,
    },
    /// `recover` on a site that was already up.
    SiteAlreadyUp {
        /// The site.
        site: SiteId,
    },
    /// Readable state of one site.
    DumpSite(SiteSnapshot),
    /// Readable copies of one variable.
    DumpVariable {
        /// The variable.
        variable: VariableId,
        /// Each hosting site with its readable value.
        copies: Vec<(SiteId, Option<Value>)>,
    },
    /// An instruction was refused.
    Rejected {
        /// The instruction text.
        instruction: String,
        /// Why.
        reason: String,
    },
    /// A transaction was still active when the script ended.
    Unfinished {
        /// Transaction label.
        txn: String,
    },
}

impl Event {
    /// Returns a stable snake_case name for the event kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Began { .. } => "began",
            Self::ReadValue { .. } => "read",
            Self::ReadDeferred { .. } => "read_deferred",
            Self::WriteBuffered { .. } => "write_buffered",
            Self::Waiting { .. } => "waiting",
            Self::Skipped { .. } => "skipped",
            Self::Committed { .. } => "committed",
            Self::Aborted { .. } => "aborted",
            Self::SiteFailed { .. } => "site_failed",
            Self::SiteRecovered { .. } => "site_recovered",
            Self::SiteAlreadyDown { .. } => "site_already_down",
            Self::SiteAlreadyUp { .. } => "site_already_up",
            Self::DumpSite(_) => "dump_site",
            Self::DumpVariable { .. } => "dump_variable",
            Self::Rejected { .. } => "rejected",
            Self::Unfinished { .. } => "unfinished",
        }
    }

    /// Returns the transaction the event is about, if any.
    #[must_use]
    pub fn transaction(&self) -> Option<&str> {
        match self {
            Self::Began { txn, .. }
            | Self::ReadValue { txn, .. }
            | Self::ReadDeferred { txn, .. }
            | Self::WriteBuffered { txn, .. }
            | Self::Waiting { txn, .. }
            | Self::Skipped { txn, .. }
            | Self::Committed { txn, .. }
            | Self::Aborted { txn, .. }
            | Self::Unfinished { txn } => Some(txn),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Began {
                txn,
                read_only: false,
                at,
            } => write!(f, "{txn} begins at {at}"),
            Self::Began {
                txn,
                read_only: true,
                at,
            } => write!(f, "{txn} begins read-only at {at}"),
            Self::ReadValue {
                txn,
                variable,
                value,
                source,
            } => {
                write!(f, "{txn} reads {variable}: {value}")?;
                match source {
                    ReadSource::OwnWrite => f.write_str(" (own write)"),
                    ReadSource::ReadSet => f.write_str(" (repeated)"),
                    ReadSource::Site(site) => write!(f, " ({site})"),
                }
            }
            Self::ReadDeferred {
                txn,
                variable,
                cause,
            } => write!(f, "{txn} waits to read {variable}: {cause}"),
            Self::WriteBuffered {
                txn,
                variable,
                value,
                target_sites,
            } => write!(
                f,
                "{txn} writes {variable}: {value} (to {target_sites} site{})",
                if *target_sites == 1 { "" } else { "s" }
            ),
            Self::Waiting { txn, instruction } => {
                write!(f, "{instruction} waits behind a blocked instruction of {txn}")
            }
            Self::Skipped {
                txn,
                instruction,
                reason,
            } => write!(f, "{instruction} ignored: {txn} aborted ({reason})"),
            Self::Committed { txn, at } => write!(f, "{txn} commits at {at}"),
            Self::Aborted { txn, reason } => write!(f, "{txn} aborts: {reason}"),
            Self::SiteFailed { site } => write!(f, "{site} fails"),
            Self::SiteRecovered { site } => write!(f, "{site} recovers"),
            Self::SiteAlreadyDown { site } => write!(f, "{site} is already down"),
            Self::SiteAlreadyUp { site } => write!(f, "{site} is already up"),
            Self::DumpSite(snapshot) => write_site(f, snapshot),
            Self::DumpVariable { variable, copies } => {
                write!(f, "{variable} - ")?;
                for (i, (site, value)) in copies.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match value {
                        Some(value) => write!(f, "{site}: {value}")?,
                        None => write!(f, "{site}: unavailable")?,
                    }
                }
                Ok(())
            }
            Self::Rejected {
                instruction,
                reason,
            } => write!(f, "rejected {instruction}: {reason}"),
            Self::Unfinished { txn } => write!(f, "{txn} never ended"),
        }
    }
}

fn write_site(f: &mut fmt::Formatter<'_>, snapshot: &SiteSnapshot) -> fmt::Result {
    write!(f, "{} - ", snapshot.site)?;
    if snapshot.status == SiteStatus::Down {
        return f.write_str("down");
    }
    for (i, (variable, value)) in snapshot.values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match value {
            Some(value) => write!(f, "{variable}: {value}")?,
            None => write!(f, "{variable}: unavailable")?,
        }
    }
    Ok(())
}
