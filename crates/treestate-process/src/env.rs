//! Environment construction for git subprocesses.
//!
//! Desktop launches often start with a minimal `PATH`, so the git binary (and
//! the credential helpers, hooks and LFS filters it runs) live in directories
//! the process cannot see. The helpers here add the usual toolchain and
//! package-manager locations and carry configured proxy variables.

use std::collections::{HashMap, HashSet};
use std::env::{join_paths, split_paths};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use serde::Deserialize;

/// System-wide install locations appended to `PATH`
pub const COMMON_BIN_DIRS: &[&str] = &[
    "/opt/homebrew/bin",
    "/opt/homebrew/sbin",
    "/usr/local/bin",
    "/usr/bin",
    "/bin",
    "/usr/sbin",
    "/sbin",
    "/opt/local/bin",
    "/snap/bin",
];

/// Per-user install locations, relative to the home directory
pub const HOME_BIN_DIRS: &[&str] = &[".cargo/bin", ".local/bin", ".volta/bin", ".bun/bin"];

/// Merge two PATH strings into a single, de-duplicated PATH.
///
/// Entries of `primary` keep their order; unseen entries of `secondary`
/// are appended. Empty components are dropped.
pub fn merge_paths(primary: impl AsRef<OsStr>, secondary: impl AsRef<OsStr>) -> OsString {
    let mut seen = HashSet::<PathBuf>::new();
    let mut merged = Vec::<PathBuf>::new();

    for p in split_paths(primary.as_ref()).chain(split_paths(secondary.as_ref())) {
        if !p.as_os_str().is_empty() && seen.insert(p.clone()) {
            merged.push(p);
        }
    }

    join_paths(merged).unwrap_or_default()
}

/// `current` PATH plus `extra` plus the common install locations
pub fn augmented_path(current: Option<&OsStr>, extra: &[PathBuf]) -> OsString {
    let mut search: Vec<PathBuf> = extra.to_vec();
    search.extend(COMMON_BIN_DIRS.iter().map(PathBuf::from));
    if let Some(home) = dirs::home_dir() {
        search.extend(HOME_BIN_DIRS.iter().map(|d| home.join(d)));
    }

    let secondary = join_paths(search).unwrap_or_default();
    merge_paths(current.unwrap_or_default(), secondary)
}

/// Proxy variables forwarded to git
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxySettings {
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
}

impl ProxySettings {
    /// Environment pairs, in both spellings tools look for
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (name, value) in [
            ("http_proxy", &self.http_proxy),
            ("https_proxy", &self.https_proxy),
            ("no_proxy", &self.no_proxy),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                pairs.push((name.to_string(), value.to_string()));
                pairs.push((name.to_ascii_uppercase(), value.to_string()));
            }
        }
        pairs
    }
}

/// Environment for every git invocation.
///
/// Only PATH and proxy entries are added on top of the inherited
/// environment; no credentials are introduced.
pub fn git_environment(proxy: &ProxySettings, extra_path: &[PathBuf]) -> HashMap<String, String> {
    let current = std::env::var_os("PATH");
    let path = augmented_path(current.as_deref(), extra_path);

    let mut env = HashMap::new();
    env.insert("PATH".to_string(), path.to_string_lossy().into_owned());
    env.insert("GIT_TERMINAL_PROMPT".to_string(), "0".to_string());
    env.insert("GIT_OPTIONAL_LOCKS".to_string(), "0".to_string());
    // Stable English messages for error classification
    env.insert("LC_ALL".to_string(), "C".to_string());
    env.extend(proxy.env_pairs());
    env
}
