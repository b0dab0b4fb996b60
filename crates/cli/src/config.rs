use anyhow::{Context as AnyhowContext, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = ".scanmap.toml";

/// Workspace-level configuration; CLI flags override each field.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScanmapConfig {
    /// Candidate local roots for the distinct-name and suffix-overlap
    /// strategies, tried in order.
    #[serde(default)]
    pub uri_bases: Vec<String>,
    pub max_diagnostics_per_file: Option<usize>,
    /// Where the learned base-URI cache persists between sessions.
    pub cache_path: Option<PathBuf>,
}

/// Read `.scanmap.toml` from `dir`, treating a missing file as defaults.
pub fn load_config(dir: &Path) -> Result<ScanmapConfig> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(ScanmapConfig::default());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
