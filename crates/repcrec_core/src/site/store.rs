//! Versioned storage for a single site.

use crate::error::{CoreError, CoreResult};
use crate::site::version::Version;
use crate::types::{SiteId, Timestamp, TransactionId, Value, VariableId};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Up/down status of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    /// The site serves reads and accepts committed writes.
    Up,
    /// The site has failed.
    Down,
}

/// One failure of a site, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownInterval {
    /// Tick of the `fail` instruction.
    pub failed_at: Timestamp,
    /// Tick of the matching `recover`, if it happened.
    pub recovered_at: Option<Timestamp>,
}

impl DownInterval {
    /// Returns true if the site was down at `tick`.
    #[must_use]
    pub fn contains(&self, tick: Timestamp) -> bool {
        self.failed_at <= tick && self.recovered_at.map_or(true, |end| tick < end)
    }
}

/// Result of a `fail` or `recover` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteTransition {
    /// The status changed.
    Changed,
    /// `fail` on a site that was already down.
    AlreadyDown,
    /// `recover` on a site that was already up.
    AlreadyUp,
}

impl SiteTransition {
    /// Returns true if the request changed the site status.
    #[must_use]
    pub fn is_changed(self) -> bool {
        self == Self::Changed
    }
}

/// Why a site cannot serve a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// The site is down.
    SiteDown,
    /// The copy has not been re-certified by a committed write since the
    /// site recovered.
    NotReadable,
    /// No version is old enough for the requested snapshot.
    NoVersion,
    /// The site does not store the variable.
    NotHosted,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SiteDown => "site down",
            Self::NotReadable => "awaiting a committed write after recovery",
            Self::NoVersion => "no version old enough",
            Self::NotHosted => "not hosted",
        };
        f.write_str(s)
    }
}

/// Outcome of a versioned lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionLookup {
    /// The version visible at the requested tick.
    Found(Version),
    /// The site cannot serve the read.
    NotAvailable(Unavailable),
}

impl VersionLookup {
    /// Returns the version if one was found.
    #[must_use]
    pub fn version(self) -> Option<Version> {
        match self {
            Self::Found(version) => Some(version),
            Self::NotAvailable(_) => None,
        }
    }
}

#[derive(Debug)]
struct VariableHistory {
    /// Ordered by strictly increasing commit timestamp.
    versions: Vec<Version>,
    readable: bool,
}

/// Versioned variable storage plus failure state for one site.
#[derive(Debug)]
pub struct SiteStore {
    id: SiteId,
    status: SiteStatus,
    down_intervals: Vec<DownInterval>,
    variables: BTreeMap<VariableId, VariableHistory>,
}

impl SiteStore {
    /// Creates a site holding a seed version of each hosted variable.
    pub fn new(id: SiteId, hosted: impl IntoIterator<Item = (VariableId, Value)>) -> Self {
        let variables = hosted
            .into_iter()
            .map(|(var, seed)| {
                (
                    var,
                    VariableHistory {
                        versions: vec![Version::seed(seed)],
                        readable: true,
                    },
                )
            })
            .collect();

        Self {
            id,
            status: SiteStatus::Up,
            down_intervals: Vec::new(),
            variables,
        }
    }

    /// Returns the site ID.
    #[must_use]
    pub fn id(&self) -> SiteId {
        self.id
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> SiteStatus {
        self.status
    }

    /// Checks if the site is up.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.status == SiteStatus::Up
    }

    /// Returns every failure of this site, oldest first.
    #[must_use]
    pub fn down_intervals(&self) -> &[DownInterval] {
        &self.down_intervals
    }

    /// Returns true if the site was down at `tick`.
    #[must_use]
    pub fn was_down_at(&self, tick: Timestamp) -> bool {
        self.down_intervals.iter().any(|i| i.contains(tick))
    }

    /// Returns true if the site stores the variable.
    #[must_use]
    pub fn hosts(&self, variable: VariableId) -> bool {
        self.variables.contains_key(&variable)
    }

    /// Iterates over hosted variables in ascending order.
    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.variables.keys().copied()
    }

    /// Returns true if the copy of `variable` may serve reads right now.
    #[must_use]
    pub fn is_readable(&self, variable: VariableId) -> bool {
        self.is_up() && self.variables.get(&variable).is_some_and(|h| h.readable)
    }

    /// Returns the full version history of a hosted variable.
    #[must_use]
    pub fn history(&self, variable: VariableId) -> Option<&[Version]> {
        self.variables.get(&variable).map(|h| h.versions.as_slice())
    }

    /// Marks the site down.
    pub fn fail(&mut self, tick: Timestamp) -> SiteTransition {
        if self.status == SiteStatus::Down {
            return SiteTransition::AlreadyDown;
        }
        self.status = SiteStatus::Down;
        self.down_intervals.push(DownInterval {
            failed_at: tick,
            recovered_at: None,
        });
        debug!(site = self.id.as_u32(), tick = tick.as_u64(), "site down");
        SiteTransition::Changed
    }

    /// Marks the site up again.
    ///
    /// Unreplicated copies are readable immediately. Replicated copies stay
    /// unreadable until a committed write re-certifies them, since another
    /// replica may have moved on while this one was down.
    pub fn recover(&mut self, tick: Timestamp) -> SiteTransition {
        if self.status == SiteStatus::Up {
            return SiteTransition::AlreadyUp;
        }
        self.status = SiteStatus::Up;
        if let Some(interval) = self.down_intervals.last_mut() {
            interval.recovered_at = Some(tick);
        }
        for (var, history) in &mut self.variables {
            history.readable = !var.is_replicated();
        }
        debug!(site = self.id.as_u32(), tick = tick.as_u64(), "site up");
        SiteTransition::Changed
    }

    /// Appends a committed version and marks the copy readable.
    ///
    /// Callers must only apply commits to sites that are up.
    pub fn apply_commit(
        &mut self,
        variable: VariableId,
        value: Value,
        timestamp: Timestamp,
        writer: TransactionId,
    ) -> CoreResult<()> {
        if !self.is_up() {
            return Err(CoreError::SiteDown { site: self.id });
        }
        let site = self.id;
        let history = self
            .variables
            .get_mut(&variable)
            .ok_or(CoreError::VariableNotHosted { site, variable })?;

        if let Some(last) = history.versions.last() {
            if last.committed_at >= timestamp {
                return Err(CoreError::TimestampRegression {
                    site,
                    variable,
                    last: last.committed_at,
                    attempted: timestamp,
                });
            }
        }

        history
            .versions
            .push(Version::committed(value, timestamp, writer));
        history.readable = true;
        Ok(())
    }

    /// Returns the version of `variable` visible at `as_of`.
    #[must_use]
    pub fn current_version(&self, variable: VariableId, as_of: Timestamp) -> VersionLookup {
        if !self.is_up() {
            return VersionLookup::NotAvailable(Unavailable::SiteDown);
        }
        let Some(history) = self.variables.get(&variable) else {
            return VersionLookup::NotAvailable(Unavailable::NotHosted);
        };
        if !history.readable {
            return VersionLookup::NotAvailable(Unavailable::NotReadable);
        }

        // Histories are sorted by commit timestamp.
        let visible = history
            .versions
            .partition_point(|v| v.committed_at <= as_of);
        match visible.checked_sub(1).map(|i| history.versions[i]) {
            Some(version) => VersionLookup::Found(version),
            None => VersionLookup::NotAvailable(Unavailable::NoVersion),
        }
    }

    /// Returns the newest version if the copy is readable.
    #[must_use]
    pub fn latest_readable(&self, variable: VariableId) -> Option<Version> {
        if !self.is_readable(variable) {
            return None;
        }
        self.variables
            .get(&variable)
            .and_then(|h| h.versions.last().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(i: u32) -> VariableId {
        VariableId::new(i)
    }

    fn ts(t: u64) -> Timestamp {
        Timestamp::new(t)
    }

    fn create_site() -> SiteStore {
        SiteStore::new(SiteId::new(2), [(x(1), 10), (x(2), 20)])
    }

    #[test]
    fn new_site_serves_seeds() {
        let site = create_site();
        assert!(site.is_up());
        let v = site.current_version(x(2), ts(0)).version().unwrap();
        assert_eq!(v.value, 20);
        assert!(v.is_seed());
    }

    #[test]
    fn snapshot_reads_ignore_later_versions() {
        let mut site = create_site();
        site.apply_commit(x(2), 21, ts(5), TransactionId::new(1))
            .unwrap();

        assert_eq!(site.current_version(x(2), ts(4)).version().unwrap().value, 20);
        assert_eq!(site.current_version(x(2), ts(5)).version().unwrap().value, 21);
    }

    #[test]
    fn down_site_serves_nothing() {
        let mut site = create_site();
        assert_eq!(site.fail(ts(3)), SiteTransition::Changed);
        assert_eq!(
            site.current_version(x(1), ts(3)),
            VersionLookup::NotAvailable(Unavailable::SiteDown)
        );
        assert_eq!(site.fail(ts(4)), SiteTransition::AlreadyDown);
        assert_eq!(site.down_intervals().len(), 1);
    }

    #[test]
    fn recovery_readability_asymmetry() {
        let mut site = create_site();
        site.fail(ts(3));
        assert_eq!(site.recover(ts(6)), SiteTransition::Changed);

        assert!(site.current_version(x(1), ts(6)).version().is_some());
        assert_eq!(
            site.current_version(x(2), ts(6)),
            VersionLookup::NotAvailable(Unavailable::NotReadable)
        );

        site.apply_commit(x(2), 99, ts(8), TransactionId::new(4))
            .unwrap();
        assert_eq!(site.current_version(x(2), ts(8)).version().unwrap().value, 99);
    }

    #[test]
    fn recover_when_up_is_noop() {
        let mut site = create_site();
        assert_eq!(site.recover(ts(1)), SiteTransition::AlreadyUp);
        assert!(site.down_intervals().is_empty());
    }

    #[test]
    fn down_interval_tracking() {
        let mut site = create_site();
        site.fail(ts(3));
        site.recover(ts(6));
        let interval = site.down_intervals()[0];
        assert_eq!(interval.recovered_at, Some(ts(6)));
        assert!(site.was_down_at(ts(3)));
        assert!(site.was_down_at(ts(5)));
        assert!(!site.was_down_at(ts(6)));
    }

    #[test]
    fn apply_commit_on_down_site_fails() {
        let mut site = create_site();
        site.fail(ts(2));
        let err = site
            .apply_commit(x(1), 5, ts(3), TransactionId::new(1))
            .unwrap_err();
        assert_eq!(err, CoreError::SiteDown { site: SiteId::new(2) });
    }

    #[test]
    fn apply_commit_rejects_old_timestamp() {
        let mut site = create_site();
        site.apply_commit(x(1), 5, ts(3), TransactionId::new(1))
            .unwrap();
        let err = site
            .apply_commit(x(1), 6, ts(3), TransactionId::new(2))
            .unwrap_err();
        assert!(matches!(err, CoreError::TimestampRegression { .. }));
        assert_eq!(site.history(x(1)).unwrap().len(), 2);
    }

    #[test]
    fn apply_commit_unhosted_variable() {
        let mut site = create_site();
        let err = site
            .apply_commit(x(3), 5, ts(3), TransactionId::new(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::VariableNotHosted { .. }));
        assert_eq!(
            site.current_version(x(3), ts(3)),
            VersionLookup::NotAvailable(Unavailable::NotHosted)
        );
    }

    #[test]
    fn latest_readable_respects_flag() {
        let mut site = create_site();
        site.fail(ts(1));
        assert!(site.latest_readable(x(1)).is_none());
        site.recover(ts(2));
        assert_eq!(site.latest_readable(x(1)).unwrap().value, 10);
        assert!(site.latest_readable(x(2)).is_none());
    }
}
