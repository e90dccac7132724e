//! Engine configuration.

/// Default number of sites.
pub const DEFAULT_NUM_SITES: u32 = 10;

/// Default number of variables (`x1..x20`).
pub const DEFAULT_NUM_VARIABLES: u32 = 20;

/// Configuration for building an engine.
///
/// The values are only checked when a [`Topology`](crate::Topology) is built
/// from them, so a config can be assembled from several sources first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of sites, numbered `1..=num_sites`.
    pub num_sites: u32,

    /// Number of variables, numbered `x1..=x{num_variables}`.
    pub num_variables: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_sites: DEFAULT_NUM_SITES,
            num_variables: DEFAULT_NUM_VARIABLES,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of sites.
    #[must_use]
    pub const fn num_sites(mut self, value: u32) -> Self {
        self.num_sites = value;
        self
    }

    /// Sets the number of variables.
    #[must_use]
    pub const fn num_variables(mut self, value: u32) -> Self {
        self.num_variables = value;
        self
    }
}
