//! Project configuration file support for treestate.
//!
//! Loads `treestate.toml` from the working directory, falling back to
//! `<config dir>/treestate/config.toml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use treestate_git::{EngineSettings, Limits};
use treestate_process::ProxySettings;

/// The config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "treestate.toml";

/// Project-level configuration
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub changes: ChangesConfig,
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub git: GitConfig,
}

/// Change list filtering
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChangesConfig {
    /// Replaces the built-in ignored directory list when set
    pub ignored_dirs: Option<Vec<String>>,
}

/// Which git to run and where to look for it
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GitConfig {
    pub binary: Option<PathBuf>,
    #[serde(default)]
    pub extra_path: Vec<PathBuf>,
}

impl ProjectConfig {
    /// Load configuration for `working_dir`.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if a file exists and parses successfully
    /// - `Ok(None)` if no file exists
    /// - `Err(...)` if a file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        Self::load_first(&Self::candidates(working_dir))
    }

    /// Files consulted in order, first hit wins
    pub fn candidates(working_dir: &Path) -> Vec<PathBuf> {
        let mut paths = vec![working_dir.join(CONFIG_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("treestate").join("config.toml"));
        }
        paths
    }

    fn load_first(paths: &[PathBuf]) -> Result<Option<Self>> {
        match paths.iter().find(|p| p.exists()) {
            Some(path) => Self::load_from(path).map(Some),
            None => Ok(None),
        }
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(config)
    }

    /// Engine settings with file values applied over the defaults
    pub fn into_settings(self) -> EngineSettings {
        let mut settings = EngineSettings::default()
            .with_limits(self.limits)
            .with_proxy(self.proxy)
            .with_extra_path(self.git.extra_path);
        if let Some(dirs) = self.changes.ignored_dirs {
            settings = settings.with_ignored_dirs(dirs);
        }
        if let Some(binary) = self.git.binary {
            settings = settings.with_git_binary(binary);
        }
        settings
    }
}
