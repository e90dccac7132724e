//! JSON configuration file.
//!
//! ```json
//! { "num_sites": 10, "num_variables": 20, "retry_limit": 5 }
//! ```
//!
//! Every key is optional. Command-line flags override the file.

use repcrec_core::EngineConfig;
use repcrec_script::DriverConfig;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file: {0}")]
    Read(#[from] io::Error),

    /// The file is not valid configuration JSON.
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings read from a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Number of sites.
    pub num_sites: Option<u32>,
    /// Number of variables.
    pub num_variables: Option<u32>,
    /// Deferred-read retry limit.
    pub retry_limit: Option<u32>,
}

impl FileConfig {
    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Flag values that override the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    /// `--sites`
    pub sites: Option<u32>,
    /// `--variables`
    pub variables: Option<u32>,
    /// `--retry-limit`
    pub retry_limit: Option<u32>,
}

/// Merges file settings and flags into engine and driver configuration.
#[must_use]
pub fn resolve(file: &FileConfig, flags: Overrides) -> (EngineConfig, DriverConfig) {
    let mut engine = EngineConfig::default();
    if let Some(sites) = flags.sites.or(file.num_sites) {
        engine = engine.num_sites(sites);
    }
    if let Some(variables) = flags.variables.or(file.num_variables) {
        engine = engine.num_variables(variables);
    }
    let driver = DriverConfig::new().retry_limit(flags.retry_limit.or(file.retry_limit));
    (engine, driver)
}
