//! Engine configuration, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{WorldError, WorldResult};

/// What the turn loop does when a rule function fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleErrorPolicy {
    /// Stop the turn and return the error.
    #[default]
    Abort,
    /// Log the failure, note it in the turn report, and keep going.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Keep resolved histories in memory. When off, every read goes to the store.
    pub caching: bool,
    /// Name of the root branch.
    pub trunk: String,
    pub on_rule_error: RuleErrorPolicy,
    /// Prefix for the names of anonymous forks.
    pub fork_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            caching: true,
            trunk: "trunk".to_string(),
            on_rule_error: RuleErrorPolicy::Abort,
            fork_prefix: "fork".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn parse(source: &str) -> WorldResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| WorldError::Config(e.to_string()))?;
        if config.trunk.is_empty() {
            return Err(WorldError::Config("trunk branch name is empty".to_string()));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> WorldResult<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| WorldError::Config(format!("{}: {e}", path.display())))?;
        Self::parse(&source)
    }
}
