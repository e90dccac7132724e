//! All sites of the system.

use crate::error::{CoreError, CoreResult};
use crate::site::store::{SiteStatus, SiteStore, SiteTransition};
use crate::topology::Topology;
use crate::types::{SiteId, Timestamp, Value, VariableId};

/// Readable state of one site, as reported by `dump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteSnapshot {
    /// The site.
    pub site: SiteId,
    /// Its status at the time of the dump.
    pub status: SiteStatus,
    /// Every hosted variable with its newest value, or `None` when the copy
    /// is not readable.
    pub values: Vec<(VariableId, Option<Value>)>,
}

/// Owns one [`SiteStore`] per configured site.
#[derive(Debug)]
pub struct SiteManager {
    /// Index `i` holds site `i + 1`.
    sites: Vec<SiteStore>,
}

impl SiteManager {
    /// Creates every site with the seed versions of its hosted variables.
    #[must_use]
    pub fn new(topology: &Topology) -> Self {
        let sites = topology
            .sites()
            .map(|site| {
                let hosted = topology
                    .hosted_at(site)
                    .into_iter()
                    .map(|var| (var, Topology::seed_value(var)));
                SiteStore::new(site, hosted)
            })
            .collect();
        Self { sites }
    }

    /// Returns the number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Returns true if there are no sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Gets a site.
    pub fn get(&self, site: SiteId) -> CoreResult<&SiteStore> {
        self.index(site).map(|i| &self.sites[i])
    }

    /// Gets a site mutably.
    pub fn get_mut(&mut self, site: SiteId) -> CoreResult<&mut SiteStore> {
        let i = self.index(site)?;
        Ok(&mut self.sites[i])
    }

    /// Iterates over all sites in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &SiteStore> {
        self.sites.iter()
    }

    /// Marks a site down.
    pub fn fail(&mut self, site: SiteId, tick: Timestamp) -> CoreResult<SiteTransition> {
        Ok(self.get_mut(site)?.fail(tick))
    }

    /// Marks a site up.
    pub fn recover(&mut self, site: SiteId, tick: Timestamp) -> CoreResult<SiteTransition> {
        Ok(self.get_mut(site)?.recover(tick))
    }

    /// Returns true if every listed site is up.
    #[must_use]
    pub fn all_up(&self, sites: &[SiteId]) -> bool {
        sites
            .iter()
            .all(|s| self.get(*s).is_ok_and(SiteStore::is_up))
    }

    /// Reports the readable state of one site.
    pub fn snapshot(&self, site: SiteId) -> CoreResult<SiteSnapshot> {
        let store = self.get(site)?;
        Ok(SiteSnapshot {
            site,
            status: store.status(),
            values: store
                .variables()
                .map(|var| (var, store.latest_readable(var).map(|v| v.value)))
                .collect(),
        })
    }

    /// Reports the readable state of every site.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<SiteSnapshot> {
        self.sites
            .iter()
            .filter_map(|s| self.snapshot(s.id()).ok())
            .collect()
    }

    fn index(&self, site: SiteId) -> CoreResult<usize> {
        let raw = site.as_u32();
        if raw == 0 || raw as usize > self.sites.len() {
            return Err(CoreError::UnknownSite { site: raw });
        }
        Ok(raw as usize - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn create_manager() -> SiteManager {
        SiteManager::new(&Topology::new(&EngineConfig::default()).unwrap())
    }

    #[test]
    fn creates_all_sites() {
        let manager = create_manager();
        assert_eq!(manager.len(), 10);
        assert!(manager.iter().all(SiteStore::is_up));
    }

    #[test]
    fn unknown_site() {
        let manager = create_manager();
        assert!(manager.get(SiteId::new(0)).is_err());
        assert!(manager.get(SiteId::new(11)).is_err());
    }

    #[test]
    fn snapshot_lists_hosted_variables() {
        let manager = create_manager();
        let snapshot = manager.snapshot(SiteId::new(4)).unwrap();
        assert_eq!(snapshot.status, SiteStatus::Up);
        // x3 and x13 live at site 4, plus the ten even variables.
        assert_eq!(snapshot.values.len(), 12);
        assert_eq!(snapshot.values[0], (VariableId::new(2), Some(20)));
        assert!(snapshot.values.contains(&(VariableId::new(13), Some(130))));
    }

    #[test]
    fn all_up_tracks_failures() {
        let mut manager = create_manager();
        let sites = [SiteId::new(1), SiteId::new(2)];
        assert!(manager.all_up(&sites));
        manager.fail(SiteId::new(2), Timestamp::new(1)).unwrap();
        assert!(!manager.all_up(&sites));
        manager.recover(SiteId::new(2), Timestamp::new(2)).unwrap();
        assert!(manager.all_up(&sites));
    }

    #[test]
    fn snapshot_of_down_site_has_no_values() {
        let mut manager = create_manager();
        manager.fail(SiteId::new(3), Timestamp::new(1)).unwrap();
        let snapshot = manager.snapshot(SiteId::new(3)).unwrap();
        assert_eq!(snapshot.status, SiteStatus::Down);
        assert!(snapshot.values.iter().all(|(_, v)| v.is_none()));
    }
}
