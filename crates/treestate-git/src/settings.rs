use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use treestate_process::ProxySettings;

use crate::changes::DEFAULT_IGNORED_DIRS;

/// Caps and timeouts for one engine instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Maximum bucket entries in a status result
    pub max_status_entries: usize,
    /// Maximum entries in a change list
    pub max_change_entries: usize,
    /// Timeout for streamed status/change collection
    pub status_timeout_ms: u64,
    /// Timeout for auxiliary git calls (pull, push, diff, ...)
    pub aux_timeout_ms: u64,
    /// Captured stderr cap
    pub stderr_limit_bytes: usize,
    /// Wait between SIGTERM and a forced kill
    pub kill_grace_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_status_entries: 5000,
            max_change_entries: 5000,
            status_timeout_ms: 15_000,
            aux_timeout_ms: 10_000,
            stderr_limit_bytes: 8 * 1024,
            kill_grace_ms: 500,
        }
    }
}

impl Limits {
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn aux_timeout(&self) -> Duration {
        Duration::from_millis(self.aux_timeout_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// Everything a [`GitService`](crate::GitService) needs besides the repository path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub limits: Limits,
    /// First path segments hidden from change lists
    pub ignored_dirs: Vec<String>,
    pub proxy: ProxySettings,
    pub git_binary: PathBuf,
    /// Extra directories searched before the common install locations
    pub extra_path: Vec<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|d| d.to_string()).collect(),
            proxy: ProxySettings::default(),
            git_binary: PathBuf::from("git"),
            extra_path: Vec::new(),
        }
    }
}

impl EngineSettings {
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_ignored_dirs(mut self, dirs: Vec<String>) -> Self {
        self.ignored_dirs = dirs;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_git_binary(mut self, binary: PathBuf) -> Self {
        self.git_binary = binary;
        self
    }

    pub fn with_extra_path(mut self, extra: Vec<PathBuf>) -> Self {
        self.extra_path = extra;
        self
    }
}
