//! Replication topology.
//!
//! Even variables are replicated at every site. An odd variable `x_i` lives
//! only at its home site `(i mod 10) + 1`. The mapping is fixed for the
//! lifetime of the engine.

use crate::config::EngineConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{SiteId, Value, VariableId};

/// Modulus of the home-site rule for odd variables.
const HOME_SITE_MODULUS: u32 = 10;

/// Maps variables to the sites hosting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    num_sites: u32,
    num_variables: u32,
}

impl Topology {
    /// Builds a topology from a configuration.
    ///
    /// Fails if there are no sites or variables, or if the home site of some
    /// odd variable is beyond the configured number of sites.
    pub fn new(config: &EngineConfig) -> CoreResult<Self> {
        if config.num_sites == 0 {
            return Err(CoreError::invalid_config("at least one site is required"));
        }
        if config.num_variables == 0 {
            return Err(CoreError::invalid_config(
                "at least one variable is required",
            ));
        }

        let topology = Self {
            num_sites: config.num_sites,
            num_variables: config.num_variables,
        };

        if let Some(var) = topology
            .variables()
            .find(|v| !v.is_replicated() && topology.home_index(*v) > config.num_sites)
        {
            return Err(CoreError::invalid_config(format!(
                "{var} needs site {} but only {} sites are configured",
                topology.home_index(var),
                config.num_sites
            )));
        }

        Ok(topology)
    }

    /// Returns the number of sites.
    #[must_use]
    pub fn num_sites(&self) -> u32 {
        self.num_sites
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn num_variables(&self) -> u32 {
        self.num_variables
    }

    /// Iterates over all sites in ascending order.
    pub fn sites(&self) -> impl Iterator<Item = SiteId> {
        (1..=self.num_sites).map(SiteId::new)
    }

    /// Iterates over all variables in ascending order.
    pub fn variables(&self) -> impl Iterator<Item = VariableId> {
        (1..=self.num_variables).map(VariableId::new)
    }

    /// Checks that a site exists.
    pub fn check_site(&self, site: u32) -> CoreResult<SiteId> {
        if (1..=self.num_sites).contains(&site) {
            Ok(SiteId::new(site))
        } else {
            Err(CoreError::UnknownSite { site })
        }
    }

    /// Checks that a variable exists.
    pub fn check_variable(&self, variable: VariableId) -> CoreResult<VariableId> {
        if (1..=self.num_variables).contains(&variable.index()) {
            Ok(variable)
        } else {
            Err(CoreError::UnknownVariable { variable })
        }
    }

    /// Returns the home site of an odd variable, `None` for replicated ones.
    #[must_use]
    pub fn home_site(&self, variable: VariableId) -> Option<SiteId> {
        if variable.is_replicated() {
            None
        } else {
            Some(SiteId::new(self.home_index(variable)))
        }
    }

    /// Returns the sites hosting a variable, in ascending order.
    ///
    /// The list is never empty; the order is the order reads try replicas in.
    #[must_use]
    pub fn sites_for(&self, variable: VariableId) -> Vec<SiteId> {
        match self.home_site(variable) {
            Some(home) => vec![home],
            None => self.sites().collect(),
        }
    }

    /// Returns true if the site stores the variable.
    #[must_use]
    pub fn is_hosted_at(&self, variable: VariableId, site: SiteId) -> bool {
        match self.home_site(variable) {
            Some(home) => home == site,
            None => true,
        }
    }

    /// Returns the variables stored at a site, in ascending order.
    #[must_use]
    pub fn hosted_at(&self, site: SiteId) -> Vec<VariableId> {
        self.variables()
            .filter(|v| self.is_hosted_at(*v, site))
            .collect()
    }

    /// Returns the value every copy of a variable starts with.
    #[must_use]
    pub fn seed_value(variable: VariableId) -> Value {
        10 * Value::from(variable.index())
    }

    fn home_index(&self, variable: VariableId) -> u32 {
        variable.index() % HOME_SITE_MODULUS + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn standard() -> Topology {
        Topology::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn odd_variables_have_one_home() {
        let topology = standard();
        assert_eq!(topology.sites_for(VariableId::new(1)), vec![SiteId::new(2)]);
        assert_eq!(topology.sites_for(VariableId::new(9)), vec![SiteId::new(10)]);
        assert_eq!(topology.sites_for(VariableId::new(11)), vec![SiteId::new(2)]);
        assert_eq!(topology.sites_for(VariableId::new(19)), vec![SiteId::new(10)]);
    }

    #[test]
    fn even_variables_everywhere() {
        let topology = standard();
        let sites = topology.sites_for(VariableId::new(4));
        assert_eq!(sites.len(), 10);
        assert_eq!(sites.first(), Some(&SiteId::new(1)));
        assert_eq!(sites.last(), Some(&SiteId::new(10)));
    }

    #[test]
    fn hosted_at_site_two() {
        let topology = standard();
        let hosted = topology.hosted_at(SiteId::new(2));
        // All ten even variables plus x1 and x11.
        assert_eq!(hosted.len(), 12);
        assert!(hosted.contains(&VariableId::new(1)));
        assert!(hosted.contains(&VariableId::new(11)));
        assert!(!hosted.contains(&VariableId::new(3)));
    }

    #[test]
    fn rejects_missing_home_site() {
        let config = EngineConfig::new().num_sites(2).num_variables(3);
        let err = Topology::new(&config).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }

    #[test]
    fn small_topology() {
        let config = EngineConfig::new().num_sites(2).num_variables(2);
        let topology = Topology::new(&config).unwrap();
        assert_eq!(topology.sites_for(VariableId::new(1)), vec![SiteId::new(2)]);
        assert_eq!(
            topology.sites_for(VariableId::new(2)),
            vec![SiteId::new(1), SiteId::new(2)]
        );
    }

    #[test]
    fn rejects_empty_config() {
        assert!(Topology::new(&EngineConfig::new().num_sites(0)).is_err());
        assert!(Topology::new(&EngineConfig::new().num_variables(0)).is_err());
    }

    #[test]
    fn check_bounds() {
        let topology = standard();
        assert!(topology.check_site(0).is_err());
        assert!(topology.check_site(11).is_err());
        assert_eq!(topology.check_site(10).unwrap(), SiteId::new(10));
        assert!(topology.check_variable(VariableId::new(21)).is_err());
    }

    #[test]
    fn seed_values() {
        assert_eq!(Topology::seed_value(VariableId::new(1)), 10);
        assert_eq!(Topology::seed_value(VariableId::new(20)), 200);
    }

    proptest! {
        #[test]
        fn topology_fidelity(index in 1u32..=20) {
            let topology = standard();
            let var = VariableId::new(index);
            let sites = topology.sites_for(var);
            if index % 2 == 1 {
                prop_assert_eq!(sites, vec![SiteId::new(index % 10 + 1)]);
            } else {
                prop_assert_eq!(sites, topology.sites().collect::<Vec<_>>());
            }
        }
    }
}
