//! Gate configuration stored under `ralph/gate.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::DEFAULT_REVIEW_CAP;

/// Gate configuration (TOML).
///
/// The file is optional and edited by humans. Missing fields default to the
/// values the loop driver assumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Hard timeout for `git status`, in seconds.
    pub status_timeout_secs: u64,

    /// Bytes of `git status` output kept in memory.
    pub status_output_limit_bytes: usize,

    /// `reviewCap` used when the iteration marker does not set one.
    pub default_review_cap: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            status_timeout_secs: 10,
            status_output_limit_bytes: 100_000,
            default_review_cap: DEFAULT_REVIEW_CAP,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.status_timeout_secs == 0 {
            return Err(anyhow!("status_timeout_secs must be > 0"));
        }
        if self.status_output_limit_bytes == 0 {
            return Err(anyhow!("status_output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GateConfig::default()`.
pub fn load_config(path: &Path) -> Result<GateConfig> {
    if !path.exists() {
        let cfg = GateConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GateConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
