use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::git::{DATA_REF, DEFAULT_REMOTE};

/// Directory that marks a project root.
pub const REEF_DIR: &str = ".reef";

/// Name of the project config file inside [`REEF_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Template written by `rf init`. Matches [`ReefConfig::default`] exactly;
/// a test keeps the two in lockstep.
pub const DEFAULT_CONFIG_TOML: &str = "[sync]\n\
    remote = \"origin\"\n\
    ref = \"refs/reef/data\"\n\
    file = \".reef/issues.jsonl\"\n\
    push = true\n\
    auto = false\n\
    debounce_ms = 500\n\
    max_retries = 3\n";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReefConfig {
    #[serde(default)]
    pub sync: SyncConfig,
}

/// The `[sync]` section: where snapshots live and how they travel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(rename = "ref", default = "default_ref")]
    pub ref_name: String,
    #[serde(default = "default_snapshot_file")]
    pub file: String,
    #[serde(default = "default_true")]
    pub push: bool,
    #[serde(default)]
    pub auto: bool,
    /// Quiet window, in milliseconds, before an auto-sync fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            ref_name: default_ref(),
            file: default_snapshot_file(),
            push: default_true(),
            auto: false,
            debounce_ms: default_debounce_ms(),
            max_retries: default_max_retries(),
        }
    }
}

/// Load `.reef/config.toml` under `project_root`, falling back to defaults
/// when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(project_root: &Path) -> Result<ReefConfig> {
    let path = project_root.join(REEF_DIR).join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ReefConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ReefConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write the default config template into `reef_dir`, leaving any existing
/// file alone.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(reef_dir: &Path) -> Result<PathBuf> {
    let path = reef_dir.join(CONFIG_FILE);
    if path.exists() {
        return Ok(path);
    }

    std::fs::write(&path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Walk up from `start` looking for a directory containing `.reef/`.
#[must_use]
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(REEF_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_string()
}

fn default_ref() -> String {
    DATA_REF.to_string()
}

fn default_snapshot_file() -> String {
    ".reef/issues.jsonl".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_debounce_ms() -> u64 {
    500
}

const fn default_max_retries() -> u32 {
    3
}
