//! Runtime configuration
//!
//! One tunables surface for the engine: directories, sheet order, timeouts
//! and bounds. Loadable from a YAML file; every field has a default so a
//! missing file or a partial file still yields a usable configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base application URL, prepended to relative navigation targets.
    pub base_url: Option<String>,

    /// Directory holding per-page object repository JSON files.
    pub repository_dir: PathBuf,

    /// Directory holding test data CSV sheets.
    pub data_dir: PathBuf,

    /// Sheet names (without extension), in lookup precedence order.
    pub sheet_order: Vec<String>,

    /// Default timeout for element resolution (ms).
    pub default_timeout_ms: u64,

    /// Timeout for overlay/spinner settling before clicks (ms).
    pub overlay_timeout_ms: u64,

    /// Timeout for title waits (ms).
    pub title_timeout_ms: u64,

    /// Maximum calendar navigation attempts (roughly two years of monthly steps).
    pub calendar_max_attempts: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            repository_dir: PathBuf::from("./repository"),
            data_dir: PathBuf::from("./testdata"),
            sheet_order: Vec::new(),
            default_timeout_ms: 10000,
            overlay_timeout_ms: 10000,
            title_timeout_ms: 60000,
            calendar_max_attempts: 24,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: RunConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Join a navigation target with the base URL unless it is absolute.
    pub fn full_url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }
        match self.base_url {
            Some(ref base) => format!("{}/{}", base.trim_end_matches('/'), target.trim_start_matches('/')),
            None => target.to_string(),
        }
    }
}
