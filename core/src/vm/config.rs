use anyhow::{Context, Result};
use serde::Deserialize;

use super::namespace::MAX_ACTIVE_PACKAGES;

/// Interpreter settings, read from a flat TOML table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Log entry into and return from every script function.
    pub trace: bool,
    /// Warn when a variable is read before it was assigned.
    pub warn_undefined_variables: bool,
    pub max_call_depth: usize,
    /// Concurrently active packages; clamped to 512.
    pub package_limit: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            trace: false,
            warn_undefined_variables: false,
            max_call_depth: 1000,
            package_limit: MAX_ACTIVE_PACKAGES,
        }
    }
}

impl ConsoleConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: ConsoleConfig = toml::from_str(text).context("parsing console config")?;
        config.package_limit = config.package_limit.min(MAX_ACTIVE_PACKAGES);
        Ok(config)
    }
}
